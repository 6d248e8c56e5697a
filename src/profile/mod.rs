pub mod client;
pub mod service;
pub mod types;

pub use self::client::{HostedProfileTable, ProfileTable};
pub use self::service::ProfileService;
pub use self::types::{
    form_to_changes, record_to_form, ProfileChanges, ProfileRecord, QuestionnaireForm,
};
