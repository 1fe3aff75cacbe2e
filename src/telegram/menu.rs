//! Keyboards and callback data

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup};

use crate::catalog::Category;

/// Reply-keyboard button that opens the catalog prompt
pub const CATALOG_BUTTON: &str = "📂 Mundarija";
/// Reply-keyboard button that explains the AI consultant
pub const AI_BUTTON: &str = "🤖 AI maslahatchi";

/// Whether `text` is one of the reply-keyboard buttons.
pub fn is_menu_label(text: &str) -> bool {
    text == CATALOG_BUTTON || text == AI_BUTTON || Category::from_button(text).is_some()
}

pub const CLEAR_CONFIRM: &str = "clear:yes";
pub const CLEAR_CANCEL: &str = "clear:no";

/// Persistent reply keyboard: one button per category plus the extras.
pub fn main_keyboard() -> KeyboardMarkup {
    let mut rows: Vec<Vec<KeyboardButton>> = Category::ALL
        .iter()
        .map(|c| vec![KeyboardButton::new(c.button_label())])
        .collect();
    rows.push(vec![KeyboardButton::new(CATALOG_BUTTON), KeyboardButton::new(AI_BUTTON)]);
    KeyboardMarkup::new(rows).resize_keyboard()
}

/// What an admin chose for a staged upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadAction {
    /// Publish now, category from the file name
    Publish,
    /// Show the category picker
    ChooseCategory,
    /// Publish now into the given category
    PublishAs(Category),
    /// Ask for a publish time
    Schedule,
    Discard,
}

impl UploadAction {
    fn prefix(&self) -> &'static str {
        match self {
            UploadAction::Publish => "pub",
            UploadAction::ChooseCategory => "cat",
            UploadAction::PublishAs(_) => "pubc",
            UploadAction::Schedule => "sch",
            UploadAction::Discard => "del",
        }
    }

    /// Callback data for this action on upload `token`
    pub fn callback_data(&self, token: &str) -> String {
        match self {
            UploadAction::PublishAs(category) => format!("{}:{}:{}", self.prefix(), token, category_code(*category)),
            _ => format!("{}:{}", self.prefix(), token),
        }
    }

    /// Parses callback data into the action and the upload token.
    pub fn parse(data: &str) -> Option<(UploadAction, String)> {
        let mut parts = data.split(':');
        let prefix = parts.next()?;
        let token = parts.next().filter(|t| !t.is_empty())?.to_string();
        let action = match (prefix, parts.next()) {
            ("pub", None) => UploadAction::Publish,
            ("cat", None) => UploadAction::ChooseCategory,
            ("sch", None) => UploadAction::Schedule,
            ("del", None) => UploadAction::Discard,
            ("pubc", Some(code)) => UploadAction::PublishAs(category_from_code(code)?),
            _ => return None,
        };
        if parts.next().is_some() {
            return None;
        }
        Some((action, token))
    }
}

/// Short ASCII codes; category tags carry an apostrophe
fn category_code(category: Category) -> &'static str {
    match category {
        Category::Primary => "p",
        Category::Upper => "u",
        Category::Assessment => "a",
    }
}

fn category_from_code(code: &str) -> Option<Category> {
    Category::ALL.into_iter().find(|c| category_code(*c) == code)
}

/// Buttons under a staged upload. The category picker is offered for single files only.
pub fn upload_keyboard(token: &str, single_file: bool) -> InlineKeyboardMarkup {
    let mut rows = vec![vec![InlineKeyboardButton::callback(
        "🚀 Hozir joylash",
        UploadAction::Publish.callback_data(token),
    )]];
    if single_file {
        rows.push(vec![InlineKeyboardButton::callback(
            "🗂 Bo'limni tanlash",
            UploadAction::ChooseCategory.callback_data(token),
        )]);
    }
    rows.push(vec![
        InlineKeyboardButton::callback("⏰ Rejalashtirish", UploadAction::Schedule.callback_data(token)),
        InlineKeyboardButton::callback("❌ Bekor qilish", UploadAction::Discard.callback_data(token)),
    ]);
    InlineKeyboardMarkup::new(rows)
}

pub fn category_keyboard(token: &str) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = Category::ALL
        .iter()
        .map(|c| {
            vec![InlineKeyboardButton::callback(
                c.button_label(),
                UploadAction::PublishAs(*c).callback_data(token),
            )]
        })
        .collect();
    rows.push(vec![InlineKeyboardButton::callback(
        "❌ Bekor qilish",
        UploadAction::Discard.callback_data(token),
    )]);
    InlineKeyboardMarkup::new(rows)
}

pub fn clear_confirm_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("✅ Ha, tozalash", CLEAR_CONFIRM),
        InlineKeyboardButton::callback("↩️ Yo'q", CLEAR_CANCEL),
    ]])
}
