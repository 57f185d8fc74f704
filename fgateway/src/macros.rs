/// Creates a single [`UnifiedMessage`](crate::UnifiedMessage) from a role shorthand.
///
/// ```rust
/// use rille::{Role, fg_msg};
///
/// let message = fg_msg!(assistant => "Done.");
/// assert_eq!(message.role, Role::Assistant);
/// assert_eq!(message.content.text(), "Done.");
/// ```
#[macro_export]
macro_rules! fg_msg {
    (system => $content:expr $(,)?) => {
        $crate::UnifiedMessage::system($content)
    };
    (user => $content:expr $(,)?) => {
        $crate::UnifiedMessage::user($content)
    };
    (assistant => $content:expr $(,)?) => {
        $crate::UnifiedMessage::assistant($content)
    };
    ($role:ident => $content:expr $(,)?) => {
        compile_error!("unsupported role: use system, user, or assistant");
    };
}

/// Creates a `Vec<UnifiedMessage>` from role/content pairs.
///
/// ```rust
/// use rille::{Role, fg_messages};
///
/// let messages = fg_messages![
///     system => "You are concise.",
///     user => "What is the weather in Oslo?",
/// ];
///
/// assert_eq!(messages.len(), 2);
/// assert_eq!(messages[0].role, Role::System);
/// assert_eq!(messages[1].role, Role::User);
/// ```
#[macro_export]
macro_rules! fg_messages {
    () => {
        Vec::<$crate::UnifiedMessage>::new()
    };
    ($($role:ident => $content:expr),+ $(,)?) => {
        vec![$($crate::fg_msg!($role => $content)),+]
    };
}
