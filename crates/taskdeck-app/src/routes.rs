//! Route table and the sign-in guard.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

/// Characters escaped in the `next` parameter; path separators stay readable.
const NEXT_PARAM: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Every page the app serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Route {
    /// Landing page.
    Home,
    /// Sign-in / sign-up.
    Auth,
    /// Overview.
    Dashboard,
    /// Task list.
    Tasks,
    /// Inbox.
    Inbox,
    /// Month calendar.
    Calendar,
    /// Kanban board.
    Kanban,
    /// Settings.
    Settings,
    /// Profile.
    Profile,
}

impl Route {
    /// All routes.
    pub const ALL: [Self; 9] = [
        Self::Home,
        Self::Auth,
        Self::Dashboard,
        Self::Tasks,
        Self::Inbox,
        Self::Calendar,
        Self::Kanban,
        Self::Settings,
        Self::Profile,
    ];

    /// The route's path.
    pub fn path(self) -> &'static str {
        match self {
            Self::Home => "/",
            Self::Auth => "/auth",
            Self::Dashboard => "/dashboard",
            Self::Tasks => "/dashboard/tasks",
            Self::Inbox => "/inbox",
            Self::Calendar => "/calendar",
            Self::Kanban => "/kanban",
            Self::Settings => "/settings",
            Self::Profile => "/profile",
        }
    }

    /// Match a path, ignoring any query string, fragment or trailing slash.
    pub fn parse(path: &str) -> Option<Self> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let trimmed = path.trim_end_matches('/');
        let path = if trimmed.is_empty() { "/" } else { trimmed };
        Self::ALL.into_iter().find(|r| r.path() == path)
    }

    /// Whether signed-out visitors may see the route.
    pub fn is_public(self) -> bool {
        matches!(self, Self::Home | Self::Auth)
    }
}

/// What to do with a navigation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteDecision {
    /// Render the route.
    Allow(Route),
    /// Go somewhere else.
    Redirect(String),
    /// Unknown path.
    NotFound,
}

/// Decide a navigation to `path`.
///
/// Signed-out visitors to a private route go to `/auth?next=<path>`.
/// Signed-in visitors to `/auth` go on to `next` (or the dashboard).
pub fn guard(path: &str, signed_in: bool) -> RouteDecision {
    let Some(route) = Route::parse(path) else {
        return RouteDecision::NotFound;
    };
    match (route, signed_in) {
        (Route::Auth, true) => RouteDecision::Redirect(after_sign_in(next_param(path)).path().to_string()),
        (r, false) if !r.is_public() => {
            RouteDecision::Redirect(format!("{}?next={}", Route::Auth.path(), encode(path)))
        }
        (r, _) => RouteDecision::Allow(r),
    }
}

/// Where to land after signing in: `next` when it names a private route,
/// otherwise the dashboard.
pub fn after_sign_in(next: Option<String>) -> Route {
    next.as_deref()
        .and_then(Route::parse)
        .filter(|r| !r.is_public())
        .unwrap_or(Route::Dashboard)
}

/// The decoded `next` query parameter of `path`.
pub fn next_param(path: &str) -> Option<String> {
    let (_, query) = path.split_once('?')?;
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("next="))
        .map(decode)
}

fn encode(path: &str) -> String {
    utf8_percent_encode(path, NEXT_PARAM).to_string()
}

fn decode(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}
