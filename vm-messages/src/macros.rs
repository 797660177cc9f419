/// Render a message template with named variables.
///
/// ```
/// use vm_messages::{msg, MESSAGES};
/// let line = msg!(MESSAGES.workspace.ui_visit, host = "localhost", port = "8006");
/// assert_eq!(line, "Visit http://localhost:8006 and Set up MacOS");
/// ```
#[macro_export]
macro_rules! msg {
    ($template:expr) => {
        $crate::builder::MessageBuilder::new($template).build()
    };
    ($template:expr, $($key:ident = $value:expr),+ $(,)?) => {
        {
            let mut builder = $crate::builder::MessageBuilder::new($template);
            $(
                builder = builder.var(stringify!($key), $value);
            )+
            builder.build()
        }
    };
}
