//! Wire contract shared with card sources.
//!
//! Sources publish two collections under their authority: `datacard` and
//! `datacardimage`. Rows are keyed by the column names below.

/// URI scheme used for every source resource.
pub const SCHEME: &str = "content";

/// Capability a source must advertise for read access.
pub const FEED_READ_PERM: &str = "org.cyanogenmod.launcher.home.api.FEED_READ";
/// Capability a source must advertise for write access.
pub const FEED_WRITE_PERM: &str = "org.cyanogenmod.launcher.home.api.FEED_WRITE";

/// Row id column, shared by both collections.
pub const ID_COL: &str = "_id";

/// Path segment marking a delete notification (`<collection>/delete/<id>`).
pub const DELETE_SEGMENT: &str = "delete";

pub mod data_card {
    pub const PATH: &str = "datacard";

    pub const SUBJECT_COL: &str = "subject";
    pub const DATE_CONTENT_CREATED_COL: &str = "date_content_created";
    pub const DATE_CREATED_COL: &str = "date_created";
    pub const LAST_MODIFIED_COL: &str = "last_modified";
    pub const CONTENT_SOURCE_IMAGE_URI_COL: &str = "content_source_image_uri";
    pub const AVATAR_IMAGE_URI_COL: &str = "avatar_image_uri";
    pub const TITLE_TEXT_COL: &str = "title_text";
    pub const SMALL_TEXT_COL: &str = "small_text";
    pub const BODY_TEXT_COL: &str = "body_text";
    pub const ACTION_1_TEXT_COL: &str = "action_1_text";
    pub const ACTION_1_URI_COL: &str = "action_1_uri";
    pub const ACTION_2_TEXT_COL: &str = "action_2_text";
    pub const ACTION_2_URI_COL: &str = "action_2_uri";
    pub const PRIORITY_COL: &str = "priority";

    /// Canonical projection requested for every card query.
    pub const PROJECTION_ALL: &[&str] = &[
        super::ID_COL,
        SUBJECT_COL,
        DATE_CONTENT_CREATED_COL,
        DATE_CREATED_COL,
        LAST_MODIFIED_COL,
        CONTENT_SOURCE_IMAGE_URI_COL,
        AVATAR_IMAGE_URI_COL,
        TITLE_TEXT_COL,
        SMALL_TEXT_COL,
        BODY_TEXT_COL,
        ACTION_1_TEXT_COL,
        ACTION_1_URI_COL,
        ACTION_2_TEXT_COL,
        ACTION_2_URI_COL,
        PRIORITY_COL,
    ];

    /// Default sort column for the cards collection (ascending).
    pub const SORT_DEFAULT_COL: &str = PRIORITY_COL;
}

pub mod data_card_image {
    pub const PATH: &str = "datacardimage";

    pub const DATA_CARD_ID_COL: &str = "data_card_id";
    pub const IMAGE_URI_COL: &str = "image_uri";

    /// Canonical projection requested for every image query.
    pub const PROJECTION_ALL: &[&str] = &[super::ID_COL, DATA_CARD_ID_COL, IMAGE_URI_COL];

    /// Default sort column for the images collection (ascending).
    pub const SORT_DEFAULT_COL: &str = DATA_CARD_ID_COL;
}
