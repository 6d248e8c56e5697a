//! Password-reset link parsing.
//!
//! The emailed reset link lands on the reset page with `access_token`,
//! `refresh_token`, and `type=recovery` embedded either as query parameters
//! or in the URL fragment, depending on the provider flow. Both locations
//! are checked; the fragment wins only when the query carries nothing.

use url::Url;

const PARAM_ACCESS_TOKEN: &str = "access_token";
const PARAM_REFRESH_TOKEN: &str = "refresh_token";
const PARAM_TYPE: &str = "type";
const RECOVERY_TYPE: &str = "recovery";

/// Token pair extracted from a recovery link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecoveryTokens {
    pub access_token: String,
    pub refresh_token: String,
}

impl RecoveryTokens {
    /// Extracts recovery tokens from a reset-page URL, or `None` when the
    /// URL is not a complete recovery link (wrong type, missing token).
    #[must_use]
    pub fn from_url(url: &Url) -> Option<Self> {
        let query = url.query_pairs();
        if let Some(tokens) = Self::from_pairs(query) {
            return Some(tokens);
        }

        let fragment = url.fragment()?;
        Self::from_pairs(url::form_urlencoded::parse(fragment.as_bytes()))
    }

    fn from_pairs<'a, I>(pairs: I) -> Option<Self>
    where
        I: Iterator<Item = (std::borrow::Cow<'a, str>, std::borrow::Cow<'a, str>)>,
    {
        let mut access_token = None;
        let mut refresh_token = None;
        let mut link_type = None;

        for (key, value) in pairs {
            match key.as_ref() {
                PARAM_ACCESS_TOKEN => access_token = Some(value.into_owned()),
                PARAM_REFRESH_TOKEN => refresh_token = Some(value.into_owned()),
                PARAM_TYPE => link_type = Some(value.into_owned()),
                _ => {}
            }
        }

        if link_type.as_deref() != Some(RECOVERY_TYPE) {
            return None;
        }

        Some(Self {
            access_token: access_token?,
            refresh_token: refresh_token?,
        })
    }
}
