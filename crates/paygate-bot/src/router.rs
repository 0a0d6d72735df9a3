//! Inbound event routing.
//!
//! An ordered list of `(name, predicate, handler)` entries; the first entry
//! whose predicate matches wins.

use paygate_core::ndjson::{EventKind, InboundEvent};

use crate::admin::{AdminButton, AdminState};
use crate::texts;

/// Per-event facts the predicates may look at.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouteContext {
    pub admin_state: AdminState,
}

/// Handler an event is dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    Start,
    AdminInput,
    ChooseTariff,
    MySessions,
    Menu,
    AdminButton,
    TariffCallback,
    Document,
    CheckPayment,
    MyId,
    AdminEnter,
    FreeText,
}

pub type Predicate = fn(&InboundEvent, &RouteContext) -> bool;

pub struct Route {
    pub name: &'static str,
    pub predicate: Predicate,
    pub handler: Handler,
    /// Refuse the event for blocked users before dispatching.
    pub checks_block: bool,
}

pub struct Router {
    routes: Vec<Route>,
}

fn text_of(event: &InboundEvent) -> Option<&str> {
    match &event.kind {
        EventKind::Text { text } => Some(text),
        _ => None,
    }
}

fn command_of(event: &InboundEvent) -> Option<&str> {
    match &event.kind {
        EventKind::Command { name } => Some(name.trim_start_matches('/')),
        _ => None,
    }
}

const fn route(
    name: &'static str,
    predicate: Predicate,
    handler: Handler,
    checks_block: bool,
) -> Route {
    Route {
        name,
        predicate,
        handler,
        checks_block,
    }
}

impl Router {
    pub const fn new(routes: Vec<Route>) -> Self {
        Self { routes }
    }

    /// The bot's route table.
    pub fn standard() -> Self {
        Self::new(vec![
            route(
                "start",
                |e, _| matches!(e.kind, EventKind::Start),
                Handler::Start,
                true,
            ),
            route(
                "admin-input",
                |e, ctx| {
                    ctx.admin_state.awaits_input()
                        && text_of(e).is_some_and(|t| AdminButton::parse(t).is_none())
                },
                Handler::AdminInput,
                false,
            ),
            route(
                "choose-tariff",
                |e, _| text_of(e) == Some(texts::BTN_CHOOSE_TARIFF),
                Handler::ChooseTariff,
                true,
            ),
            route(
                "my-sessions",
                |e, _| text_of(e) == Some(texts::BTN_MY_SESSIONS),
                Handler::MySessions,
                true,
            ),
            route(
                "menu",
                |e, _| text_of(e) == Some(texts::BTN_MENU),
                Handler::Menu,
                true,
            ),
            route(
                "admin-button",
                |e, _| text_of(e).and_then(AdminButton::parse).is_some(),
                Handler::AdminButton,
                false,
            ),
            route(
                "tariff-callback",
                |e, _| {
                    matches!(&e.kind, EventKind::Callback { data }
                        if data.starts_with(texts::TARIFF_CALLBACK_PREFIX))
                },
                Handler::TariffCallback,
                true,
            ),
            // The pipeline runs its own block check.
            route(
                "document",
                |e, _| matches!(e.kind, EventKind::Document(_)),
                Handler::Document,
                false,
            ),
            route(
                "checkpayment",
                |e, _| command_of(e) == Some("checkpayment"),
                Handler::CheckPayment,
                true,
            ),
            route(
                "myid",
                |e, _| command_of(e) == Some("myid"),
                Handler::MyId,
                false,
            ),
            route(
                "admin",
                |e, _| command_of(e) == Some("admin"),
                Handler::AdminEnter,
                false,
            ),
            route(
                "free-text",
                |e, _| text_of(e).is_some(),
                Handler::FreeText,
                false,
            ),
        ])
    }

    /// First route whose predicate matches.
    pub fn resolve(&self, event: &InboundEvent, ctx: &RouteContext) -> Option<&Route> {
        self.routes.iter().find(|r| (r.predicate)(event, ctx))
    }

    pub fn route_names(&self) -> Vec<&'static str> {
        self.routes.iter().map(|r| r.name).collect()
    }
}
