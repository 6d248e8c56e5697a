//! Onboarding gate and route guard.
//!
//! A pure mapping from the session snapshot and the requested path to a
//! render-or-redirect action, re-evaluated on every render. Access control
//! lives on the API side; this only shapes navigation.

use crate::auth::state::SessionState;

pub mod paths {
    pub const LANDING: &str = "/";
    pub const AUTH: &str = "/auth";
    pub const RESET_PASSWORD: &str = "/reset-password";
    pub const QUESTIONNAIRE: &str = "/questionnaire";
    pub const DASHBOARD: &str = "/dashboard";
}

/// Where the viewer stands in the auth lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthPhase {
    /// Initial session fetch still pending.
    Loading,
    Anonymous,
    AuthenticatedIncomplete,
    AuthenticatedComplete,
}

impl AuthPhase {
    #[must_use]
    pub fn derive(state: &SessionState) -> Self {
        if state.loading {
            return Self::Loading;
        }
        match &state.session {
            None => Self::Anonymous,
            Some(session) if session.user.onboarding_completed() => Self::AuthenticatedComplete,
            Some(_) => Self::AuthenticatedIncomplete,
        }
    }
}

/// What the router should do with the requested path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteAction {
    Render,
    RedirectToAuth,
    RedirectToQuestionnaire,
    RedirectToDashboard,
}

/// Route guard table. `allow_stale_auth_page` keeps the auth page visible
/// for an authenticated viewer (e.g. to show the sign-in form while a stale
/// session exists) instead of auto-redirecting away.
#[must_use]
pub fn route(phase: AuthPhase, path: &str, allow_stale_auth_page: bool) -> RouteAction {
    // While loading, render; callers show a spinner until the phase settles.
    if phase == AuthPhase::Loading {
        return RouteAction::Render;
    }

    match path {
        paths::AUTH => match phase {
            AuthPhase::Anonymous | AuthPhase::Loading => RouteAction::Render,
            _ if allow_stale_auth_page => RouteAction::Render,
            AuthPhase::AuthenticatedIncomplete => RouteAction::RedirectToQuestionnaire,
            AuthPhase::AuthenticatedComplete => RouteAction::RedirectToDashboard,
        },
        paths::QUESTIONNAIRE => match phase {
            AuthPhase::Anonymous => RouteAction::RedirectToAuth,
            AuthPhase::AuthenticatedComplete => RouteAction::RedirectToDashboard,
            _ => RouteAction::Render,
        },
        paths::DASHBOARD => match phase {
            AuthPhase::Anonymous => RouteAction::RedirectToAuth,
            AuthPhase::AuthenticatedIncomplete => RouteAction::RedirectToQuestionnaire,
            _ => RouteAction::Render,
        },
        // Landing, reset-password, and anything unrecognized render as-is.
        _ => RouteAction::Render,
    }
}
