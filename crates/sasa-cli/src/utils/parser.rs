use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid --set format: '{0}'. Expected KEY=VALUE.")]
    InvalidKeyValue(String),

    #[error("Key cannot be empty in '{0}'.")]
    EmptyKey(String),

    #[error("Launcher command cannot be empty.")]
    EmptyLauncher,

    #[error("Unterminated quote in launcher command '{0}'.")]
    UnterminatedQuote(String),
}

/// Splits `KEY=VALUE` at the first `=`; both sides are trimmed.
pub fn parse_key_value(input: &str) -> Result<(&str, &str), ParseError> {
    let (key, value) = input
        .split_once('=')
        .ok_or_else(|| ParseError::InvalidKeyValue(input.to_string()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(ParseError::EmptyKey(input.to_string()));
    }
    Ok((key, value.trim()))
}

/// Splits a launcher command such as `mpirun -np 4` into its arguments.
///
/// Single or double quotes group words; no other shell syntax is interpreted.
pub fn parse_launcher(input: &str) -> Result<Vec<String>, ParseError> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;

    for c in input.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    args.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if quote.is_some() {
        return Err(ParseError::UnterminatedQuote(input.to_string()));
    }
    if in_word {
        args.push(current);
    }
    if args.is_empty() {
        return Err(ParseError::EmptyLauncher);
    }
    Ok(args)
}
