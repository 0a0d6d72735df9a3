//! Administrator panel state machine.
//!
//! [`transition`] is the whole transition table: it maps the current state
//! and one input to the next state plus the effect the handler must carry
//! out. It has no I/O, so every path is unit-testable. [`guarded_transition`]
//! puts the capability check in front of it.

use subtle::ConstantTimeEq;

use crate::texts;

/// Administrator panel states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdminState {
    #[default]
    Idle,
    AwaitingPassword,
    MainMenu,
    EditingCard,
    EditingName,
    EditingTariff,
    BlockingUser,
    UnblockingUser,
    ViewingStats,
}

impl AdminState {
    /// States that consume the next free-text message as their value.
    pub const fn awaits_input(self) -> bool {
        matches!(
            self,
            Self::AwaitingPassword
                | Self::EditingCard
                | Self::EditingName
                | Self::EditingTariff
                | Self::BlockingUser
                | Self::UnblockingUser
        )
    }

    /// States in which the menu keyboard is live.
    pub const fn in_panel(self) -> bool {
        !matches!(self, Self::Idle | Self::AwaitingPassword)
    }
}

/// What the caller is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Admin,
    User,
}

impl Capability {
    pub fn of(user_id: i64, admin_ids: &[i64]) -> Self {
        if admin_ids.contains(&user_id) {
            Self::Admin
        } else {
            Self::User
        }
    }
}

/// Admin menu buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminButton {
    Stats,
    Users,
    Blocks,
    PaymentDetails,
    EditCard,
    EditName,
    EditTariff,
    BlockUser,
    UnblockUser,
    Exit,
}

impl AdminButton {
    pub fn parse(text: &str) -> Option<Self> {
        let button = match text {
            texts::BTN_ADMIN_STATS => Self::Stats,
            texts::BTN_ADMIN_USERS => Self::Users,
            texts::BTN_ADMIN_BLOCKS => Self::Blocks,
            texts::BTN_ADMIN_PAYMENT => Self::PaymentDetails,
            texts::BTN_ADMIN_EDIT_CARD => Self::EditCard,
            texts::BTN_ADMIN_EDIT_NAME => Self::EditName,
            texts::BTN_ADMIN_EDIT_TARIFF => Self::EditTariff,
            texts::BTN_ADMIN_BLOCK => Self::BlockUser,
            texts::BTN_ADMIN_UNBLOCK => Self::UnblockUser,
            texts::BTN_ADMIN_EXIT => Self::Exit,
            _ => return None,
        };
        Some(button)
    }
}

/// One input to the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminInput {
    /// The `/admin` command. Without a configured password the panel opens
    /// immediately.
    Enter { password_required: bool },
    /// A password attempt, already checked.
    Password { valid: bool },
    Button(AdminButton),
    /// Free text while a value is expected.
    Value(String),
}

/// Field a prompt asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    Password,
    CardNumber,
    Name,
    TariffPrice,
    BlockUser,
    UnblockUser,
}

/// Work the handler performs after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminEffect {
    Ask(Prompt),
    LoginSucceeded,
    LoginFailed,
    ShowStats,
    ShowUsers,
    ShowBlocks,
    ShowPaymentDetails,
    SetCardNumber(String),
    /// Card holder name, and the recipient name checked on receipts.
    SetNames { card_name: String, recipient_name: String },
    SetTariffPrice { name: String, price: u32 },
    Block(i64),
    Unblock(i64),
    /// The value did not parse; the state is unchanged.
    InvalidInput,
    Exit,
}

/// Compare a password attempt in constant time.
///
/// An empty configured password never matches.
pub fn password_matches(attempt: &str, configured: &str) -> bool {
    !configured.is_empty() && bool::from(attempt.as_bytes().ct_eq(configured.as_bytes()))
}

/// The transition table.
///
/// Returns `None` for inputs the state does not accept.
pub fn transition(state: AdminState, input: &AdminInput) -> Option<(AdminState, AdminEffect)> {
    use AdminEffect as E;
    use AdminState as S;

    match (state, input) {
        (_, AdminInput::Enter { password_required: true }) => {
            Some((S::AwaitingPassword, E::Ask(Prompt::Password)))
        }
        (_, AdminInput::Enter { password_required: false }) => {
            Some((S::MainMenu, E::LoginSucceeded))
        }

        (S::AwaitingPassword, AdminInput::Password { valid: true }) => {
            Some((S::MainMenu, E::LoginSucceeded))
        }
        (S::AwaitingPassword, AdminInput::Password { valid: false }) => {
            Some((S::Idle, E::LoginFailed))
        }

        (S::EditingCard, AdminInput::Value(text)) => Some(match non_empty(text) {
            Some(card) => (S::MainMenu, E::SetCardNumber(card.to_string())),
            None => (state, E::InvalidInput),
        }),
        (S::EditingName, AdminInput::Value(text)) => Some(match parse_names(text) {
            Some((card_name, recipient_name)) => (
                S::MainMenu,
                E::SetNames {
                    card_name,
                    recipient_name,
                },
            ),
            None => (state, E::InvalidInput),
        }),
        (S::EditingTariff, AdminInput::Value(text)) => Some(match parse_tariff_price(text) {
            Some((name, price)) => (S::MainMenu, E::SetTariffPrice { name, price }),
            None => (state, E::InvalidInput),
        }),
        (S::BlockingUser, AdminInput::Value(text)) => Some(match parse_user_id(text) {
            Some(user_id) => (S::MainMenu, E::Block(user_id)),
            None => (state, E::InvalidInput),
        }),
        (S::UnblockingUser, AdminInput::Value(text)) => Some(match parse_user_id(text) {
            Some(user_id) => (S::MainMenu, E::Unblock(user_id)),
            None => (state, E::InvalidInput),
        }),

        // Any menu button leaves a pending edit.
        (s, AdminInput::Button(button)) if s.in_panel() => Some(menu(*button)),

        _ => None,
    }
}

/// [`transition`] behind the capability check; non-administrators get `None`.
pub fn guarded_transition(
    capability: Capability,
    state: AdminState,
    input: &AdminInput,
) -> Option<(AdminState, AdminEffect)> {
    match capability {
        Capability::Admin => transition(state, input),
        Capability::User => None,
    }
}

const fn menu(button: AdminButton) -> (AdminState, AdminEffect) {
    use AdminEffect as E;
    use AdminState as S;

    match button {
        AdminButton::Stats => (S::ViewingStats, E::ShowStats),
        AdminButton::Users => (S::MainMenu, E::ShowUsers),
        AdminButton::Blocks => (S::MainMenu, E::ShowBlocks),
        AdminButton::PaymentDetails => (S::MainMenu, E::ShowPaymentDetails),
        AdminButton::EditCard => (S::EditingCard, E::Ask(Prompt::CardNumber)),
        AdminButton::EditName => (S::EditingName, E::Ask(Prompt::Name)),
        AdminButton::EditTariff => (S::EditingTariff, E::Ask(Prompt::TariffPrice)),
        AdminButton::BlockUser => (S::BlockingUser, E::Ask(Prompt::BlockUser)),
        AdminButton::UnblockUser => (S::UnblockingUser, E::Ask(Prompt::UnblockUser)),
        AdminButton::Exit => (S::Idle, E::Exit),
    }
}

fn non_empty(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// First line is the card holder name; an optional second line is the
/// recipient name matched on receipts, which otherwise equals the first.
fn parse_names(text: &str) -> Option<(String, String)> {
    let mut lines = text.lines().filter_map(non_empty);
    let card_name = lines.next()?.to_string();
    let recipient_name = lines.next().map_or_else(|| card_name.clone(), str::to_string);
    Some((card_name, recipient_name))
}

/// `<tariff name>=<price>`
fn parse_tariff_price(text: &str) -> Option<(String, u32)> {
    let (name, price) = text.split_once('=')?;
    let name = non_empty(name)?;
    let price = price.trim().parse().ok()?;
    Some((name.to_string(), price))
}

fn parse_user_id(text: &str) -> Option<i64> {
    text.trim().parse().ok()
}
