//! User-facing strings and keyboards.

use paygate_core::Tariff;
use paygate_core::config::PaymentConfig;
use paygate_core::ndjson::{InlineButton, Keyboard};

use crate::receipt::ValidationReason;
use crate::sessions::SessionStatus;

pub const BTN_CHOOSE_TARIFF: &str = "💎 Выбрать тариф";
pub const BTN_MY_SESSIONS: &str = "🕒 Мои сессии";
pub const BTN_MENU: &str = "📋 Меню";

pub const BTN_ADMIN_STATS: &str = "📊 Статистика";
pub const BTN_ADMIN_USERS: &str = "👥 Пользователи";
pub const BTN_ADMIN_BLOCKS: &str = "🔒 Блокировки";
pub const BTN_ADMIN_PAYMENT: &str = "💳 Реквизиты";
pub const BTN_ADMIN_EDIT_CARD: &str = "✏️ Номер карты";
pub const BTN_ADMIN_EDIT_NAME: &str = "✏️ Получатель";
pub const BTN_ADMIN_EDIT_TARIFF: &str = "✏️ Цены тарифов";
pub const BTN_ADMIN_BLOCK: &str = "⛔ Заблокировать";
pub const BTN_ADMIN_UNBLOCK: &str = "✅ Разблокировать";
pub const BTN_ADMIN_EXIT: &str = "📋 Главное меню";

/// Callback payload prefix of tariff buttons.
pub const TARIFF_CALLBACK_PREFIX: &str = "tariff_";

pub const WELCOME: &str = "🔥 Добро пожаловать в наш бот!\n\n\
    Здесь вы можете получить код доступа к сервису.\n\n\
    Нажмите кнопку ниже, чтобы выбрать тариф.";
pub const CHOOSE_TARIFF: &str = "Выберите подходящий тариф:";
pub const CHOOSE_TARIFF_FOR_ACCESS: &str = "Выберите тариф для доступа:";
pub const BLOCKED: &str = "⛔ Ваш доступ к боту заблокирован";
pub const BLOCKED_FOR_SUSPICIOUS: &str = "⛔ Вы заблокированы за подозрительные чеки";
pub const SELECT_TARIFF_FIRST: &str = "❌ Сначала выберите тариф через меню";
pub const PDF_REQUIRED: &str = "❌ Отправьте чек в формате PDF";
pub const PROCESSING: &str = "⏳ Обрабатываю чек...";
pub const RETRY: &str = "⚠️ Ошибка обработки чека. Попробуйте снова";
pub const RECEIPT_NOT_FOUND: &str = "❌ Чек не найден или просрочен. Отправьте PDF-чек.";
pub const FREE_TIER_USED: &str = "❌ Бесплатный тариф доступен только новым пользователям";
pub const NO_SESSIONS: &str = "У вас ещё нет сессий.";
pub const MENU_HINT: &str = "Воспользуйтесь меню ниже 👇";
pub const MAIN_MENU: &str = "📋 Главное меню";
pub const GENERIC_ERROR: &str = "⚠️ Произошла ошибка. Попробуйте снова";
pub const ADMIN_PASSWORD_PROMPT: &str = "🔑 Введите пароль администратора:";
pub const ADMIN_WRONG_PASSWORD: &str = "❌ Неверный пароль";
pub const ADMIN_MENU: &str = "👨‍💻 Панель администратора\nВыберите раздел:";
pub const ADMIN_INVALID_INPUT: &str = "❌ Неверный формат, попробуйте ещё раз";
pub const ADMIN_STORE_ERROR: &str = "⚠️ Ошибка получения данных";

pub fn main_keyboard() -> Keyboard {
    Keyboard::Reply {
        rows: vec![
            vec![BTN_CHOOSE_TARIFF.to_string()],
            vec![BTN_MY_SESSIONS.to_string()],
            vec![BTN_MENU.to_string()],
        ],
    }
}

pub fn admin_keyboard() -> Keyboard {
    let rows = [
        &[BTN_ADMIN_STATS, BTN_ADMIN_USERS][..],
        &[BTN_ADMIN_BLOCKS, BTN_ADMIN_PAYMENT],
        &[BTN_ADMIN_EDIT_CARD, BTN_ADMIN_EDIT_NAME],
        &[BTN_ADMIN_EDIT_TARIFF],
        &[BTN_ADMIN_BLOCK, BTN_ADMIN_UNBLOCK],
        &[BTN_ADMIN_EXIT],
    ];
    Keyboard::Reply {
        rows: rows
            .iter()
            .map(|row| row.iter().map(|b| (*b).to_string()).collect())
            .collect(),
    }
}

/// One inline button per tariff, in the given order.
pub fn tariff_keyboard(tariffs: &[Tariff], currency_symbol: &str) -> Keyboard {
    Keyboard::Inline {
        buttons: tariffs
            .iter()
            .map(|t| InlineButton {
                text: if t.is_free() {
                    format!("{} (бесплатно)", t.name)
                } else {
                    format!("{} - {}{currency_symbol}", t.name, t.price)
                },
                data: format!("{TARIFF_CALLBACK_PREFIX}{}", t.name),
            })
            .collect(),
    }
}

pub fn payment_instructions(tariff: &Tariff, payment: &PaymentConfig) -> String {
    format!(
        "Тариф: {}\nСумма к оплате: {}{}\n\nРеквизиты для оплаты:\nКарта: {}\nПолучатель: {}\n\n\
         После оплаты отправьте чек (PDF). Код придёт сразу после проверки.",
        tariff.name,
        tariff.price,
        payment.currency.symbol,
        payment.card_number,
        payment.card_name,
    )
}

/// HTML reply carrying a fresh code.
pub fn access_code(code: &str, tariff: &Tariff) -> String {
    format!(
        "✅ Ваш код доступа: <code>{code}</code>\nТариф: {}\nСрок действия: {} минут",
        tariff.name, tariff.duration_minutes
    )
}

/// HTML reply for an already issued, still active code.
pub fn active_code(session: &SessionStatus, offset: chrono::FixedOffset) -> String {
    format!(
        "✅ Ваш код доступа: <code>{}</code>\nТариф: {}\nДействует до: {}",
        session.code,
        session.tariff,
        session.expires_display(offset)
    )
}

pub fn document_too_large(max_bytes: u64) -> String {
    format!(
        "❌ Файл слишком большой. Максимум: {}MB",
        max_bytes / 1024 / 1024
    )
}

pub fn rejection_reason(
    reason: ValidationReason,
    price: u32,
    max_age_minutes: u32,
    symbol: &str,
) -> String {
    match reason {
        ValidationReason::AmountMismatch => {
            format!("❌ Сумма в чеке не соответствует тарифу ({price}{symbol})")
        }
        ValidationReason::RecipientMismatch => {
            "❌ Получатель в чеке не соответствует указанному".to_string()
        }
        ValidationReason::TimeUnparsable => "❌ Не удалось определить время в чеке".to_string(),
        ValidationReason::TimeTooOld => {
            format!("❌ Чек слишком старый (более {max_age_minutes} минут)")
        }
        ValidationReason::TransactionIdMissingInFilename => {
            "❌ Не удалось найти номер транзакции в чеке".to_string()
        }
        ValidationReason::TransactionIdNotInText => {
            "❌ Номер транзакции из имени файла не найден в чеке".to_string()
        }
        ValidationReason::TransactionAlreadyUsed => "❌ Этот чек уже был использован".to_string(),
        ValidationReason::Accepted => "✅ Чек успешно прошел проверку".to_string(),
    }
}

/// Rejection reason followed by the submission checklist.
pub fn rejection_with_checklist(
    reason: ValidationReason,
    tariff: &Tariff,
    payment: &PaymentConfig,
    max_age_minutes: u32,
) -> String {
    let symbol = &payment.currency.symbol;
    format!(
        "{}\n\nПожалуйста, убедитесь что:\n\
         1. Чек в формате PDF\n\
         2. Сумма соответствует выбранному тарифу ({}{symbol})\n\
         3. Получатель: {}\n\
         4. Чек не старше {max_age_minutes} минут",
        rejection_reason(reason, tariff.price, max_age_minutes, symbol),
        tariff.price,
        payment.recipient_name,
    )
}

/// Session list with status markers; codes are shown for active sessions only.
pub fn sessions_list(sessions: &[SessionStatus], offset: chrono::FixedOffset) -> String {
    if sessions.is_empty() {
        return NO_SESSIONS.to_string();
    }

    let mut lines = vec!["Ваши сессии:\n".to_string()];
    lines.extend(sessions.iter().map(|s| {
        let marker = if s.active { "🟢" } else { "🔴" };
        let code = if s.active {
            format!(" - код: {}", s.code)
        } else {
            String::new()
        };
        format!(
            "{marker} {} мин. (до {}){code}",
            s.duration_minutes,
            s.expires_display(offset)
        )
    }));
    lines.join("\n")
}

pub fn my_id(user_id: i64) -> String {
    format!("Ваш chat_id: {user_id}")
}

pub fn admin_stats(total: i64, new_today: i64, payments: i64, amount: i64, symbol: &str) -> String {
    format!(
        "📊 Статистика:\n👥 Всего пользователей: {total}\n🆕 Новых сегодня: {new_today}\n\
         💳 Платежей сегодня: {payments} на {amount}{symbol}"
    )
}

pub fn admin_users(total: i64) -> String {
    format!("Всего пользователей: {total}")
}

pub fn admin_blocks(blocked: i64) -> String {
    format!("Заблокировано пользователей: {blocked}")
}

pub fn admin_payment_details(payment: &PaymentConfig) -> String {
    let prices: Vec<String> = payment
        .tariffs
        .iter()
        .map(|t| format!("{} = {}{}", t.name, t.price, payment.currency.symbol))
        .collect();
    format!(
        "Текущие реквизиты:\nКарта: {}\nПолучатель: {}\nИмя для проверки: {}\n\nТарифы:\n{}",
        payment.card_number,
        payment.card_name,
        payment.recipient_name,
        prices.join("\n")
    )
}

pub const ADMIN_PROMPT_CARD: &str = "Введите новый номер карты:";
pub const ADMIN_PROMPT_NAME: &str =
    "Введите имя получателя на карте.\nВторой строкой можно указать имя для проверки чеков.";
pub const ADMIN_PROMPT_TARIFF: &str = "Введите новую цену в формате <тариф>=<цена>:";
pub const ADMIN_PROMPT_BLOCK: &str = "Введите ID пользователя для блокировки:";
pub const ADMIN_PROMPT_UNBLOCK: &str = "Введите ID пользователя для разблокировки:";
pub const ADMIN_SAVED: &str = "✅ Сохранено";
pub const ADMIN_UNKNOWN_TARIFF: &str = "❌ Тариф не найден";

pub fn admin_blocked_user(user_id: i64) -> String {
    format!("⛔ Пользователь {user_id} заблокирован")
}

pub fn admin_unblocked_user(user_id: i64, had_records: bool) -> String {
    if had_records {
        format!("✅ Пользователь {user_id} разблокирован")
    } else {
        format!("Пользователь {user_id} не был заблокирован")
    }
}
