//! Application state for the trombone shell.
//!
//! The `App` owns the API scope handed down from `main`, the route table and
//! the current location. Pages read the client and cache through the scope;
//! nothing here talks to the network directly.

use tracing::{debug, info};
use trombone_core::ApiScope;

/// Pages the shell can render inside the layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Overview,
}

impl Page {
    pub fn title(&self) -> &'static str {
        match self {
            Page::Overview => "Overview",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Route {
    pub path: &'static str,
    pub page: Page,
}

/// Every route renders inside the shared layout.
pub const ROUTES: &[Route] = &[Route {
    path: "/",
    page: Page::Overview,
}];

/// Find the page for a path. Trailing slashes are ignored; empty means `/`.
pub fn resolve(path: &str) -> Option<Page> {
    let trimmed = path.trim_end_matches('/');
    let normalized = if trimmed.is_empty() { "/" } else { trimmed };
    ROUTES
        .iter()
        .find(|route| route.path == normalized)
        .map(|route| route.page)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    Quitting,
}

pub struct App {
    pub scope: ApiScope,
    pub location: String,
    pub state: AppState,
    pub status_message: Option<String>,
}

impl App {
    pub fn new(scope: ApiScope) -> Self {
        Self {
            scope,
            location: "/".to_string(),
            state: AppState::Normal,
            status_message: None,
        }
    }

    pub fn current_page(&self) -> Option<Page> {
        resolve(&self.location)
    }

    pub fn navigate(&mut self, path: &str) {
        debug!(from = %self.location, to = %path, "Navigating");
        self.location = path.to_string();
    }

    /// Where requests go, for the status bar
    pub fn api_label(&self) -> String {
        match self.scope.use_api() {
            Ok(client) if client.base_url().is_empty() => "same-origin".to_string(),
            Ok(client) => client.base_url().to_string(),
            Err(e) => format!("unavailable ({})", e),
        }
    }

    /// Terminal focus returned. Returns the number of reads revalidated.
    pub fn on_focus_gained(&mut self) -> usize {
        match self.scope.context() {
            Some(context) => context.cache().notify_focus(),
            None => 0,
        }
    }

    /// Re-issue every observed read
    pub fn refresh(&mut self) {
        let started = self
            .scope
            .context()
            .map(|context| context.cache().invalidate_all())
            .unwrap_or(0);
        info!(started, "Manual refresh");
        self.status_message = Some(match started {
            0 => "Nothing to refresh".to_string(),
            1 => "Refreshing 1 read...".to_string(),
            n => format!("Refreshing {} reads...", n),
        });
    }

    pub fn quit(&mut self) {
        self.state = AppState::Quitting;
    }
}
