// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Navigation port.
//!
//! Flows never move the user themselves; they ask a [`Navigator`] to replace
//! the current route. The embedding shell (browser router, CLI, test) decides
//! what that means.

use std::sync::Mutex;

use tracing::info;

use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Dashboard,
    /// Return to wherever the user came from.
    Back,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Dashboard => "/dashboard",
            Route::Back => "..",
        }
    }
}

pub trait Navigator: Send + Sync {
    fn replace(&self, route: Route);
}

/// Remembers every navigation request, in order.
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<Route>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn routes(&self) -> Vec<Route> {
        self.routes.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn count(&self, route: Route) -> usize {
        self.routes().iter().filter(|r| **r == route).count()
    }
}

impl Navigator for RecordingNavigator {
    fn replace(&self, route: Route) {
        info!(route = route.path(), "Navigate");
        self.routes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(route);
    }
}

/// Route guard for authenticated pages: `Some(Route::Login)` when the user
/// must log in first.
pub fn guard(session: Option<&Session>) -> Option<Route> {
    match session {
        Some(session) if session.is_authenticated() => None,
        _ => Some(Route::Login),
    }
}
