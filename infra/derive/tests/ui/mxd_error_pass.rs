use mxd_derive::mxd_error;
use std::borrow::Cow;

#[mxd_error]
pub enum DemoError {
    #[error("IO error{}: {source}", format_context(.context))]
    Io {
        #[source]
        source: std::io::Error,
        context: Option<Cow<'static, str>>,
    },

    #[error("Missing port{}", format_context(.context))]
    MissingPort { context: Option<Cow<'static, str>> },

    #[error("Internal error{}: {message}", format_context(.context))]
    Internal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },
}

fn read() -> Result<String, DemoError> {
    std::fs::read_to_string("/definitely/not/here").context("reading fixture")
}

fn main() {
    let err = read().unwrap_err();
    assert!(err.to_string().contains("(reading fixture)"));

    let err: Result<(), DemoError> = Err(DemoError::MissingPort { context: None });
    let err = err.context("cli").unwrap_err();
    assert_eq!(err.to_string(), "Missing port (cli)");

    let err = DemoError::from("boom");
    assert_eq!(err.to_string(), "Internal error: boom");
}
