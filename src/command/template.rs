//! Command templates, argument schemas and resolved commands.
//!
//! A [`CommandTemplate`] pairs a pattern such as `mac tx cnf {port} {data}`
//! with an ordered list of [`Placeholder`]s. Binding [`Args`] to a template
//! produces a [`Command`], which is validated in full before it can reach
//! the serial line.

use std::collections::BTreeMap;
use std::fmt;

use crate::command::catalog::CommandId;
use crate::error::{LoRaError, Result};
use crate::util::hex::check_hex;

/// Accepted lengths for a hex argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HexLen {
    /// Exactly this many hex digits.
    Exact(usize),
    /// Any non-empty even number of digits up to the bound.
    Even { max: usize },
}

/// Semantic type of a placeholder, with its constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    /// Unsigned decimal integer within `min..=max`.
    Integer { min: u64, max: u64 },
    /// Hex string.
    Hex(HexLen),
    /// One of a fixed set of literal tokens.
    Enum(&'static [&'static str]),
    /// Free text without whitespace or control characters.
    Text,
}

impl ArgKind {
    /// Check a value against this kind. The error is a human-readable reason.
    pub fn check(&self, value: &str) -> std::result::Result<(), String> {
        match *self {
            ArgKind::Integer { min, max } => {
                if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(format!("'{value}' is not a decimal integer"));
                }
                let n: u64 = value
                    .parse()
                    .map_err(|_| format!("'{value}' is out of range {min}..={max}"))?;
                if n < min || n > max {
                    return Err(format!("{n} is out of range {min}..={max}"));
                }
                Ok(())
            }
            ArgKind::Hex(len) => {
                let digits = match len {
                    HexLen::Exact(n) => Some(n),
                    HexLen::Even { max } => {
                        if value.len() > max {
                            return Err(format!(
                                "{} hex digits exceeds the maximum of {max}",
                                value.len()
                            ));
                        }
                        None
                    }
                };
                check_hex(value, digits).map_err(|e| e.to_string())
            }
            ArgKind::Enum(allowed) => {
                if allowed.contains(&value) {
                    Ok(())
                } else {
                    Err(format!("'{value}' is not one of {}", allowed.join(", ")))
                }
            }
            ArgKind::Text => {
                if value.is_empty() {
                    Err("empty value".to_string())
                } else if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
                    Err(format!("'{}' contains whitespace or control characters", value.escape_debug()))
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// A named parameter of a command pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub name: &'static str,
    pub kind: ArgKind,
}

impl Placeholder {
    pub const fn new(name: &'static str, kind: ArgKind) -> Self {
        Placeholder { name, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(&'static str),
    /// Index into the placeholder list.
    Slot(usize),
}

/// A parameterized command pattern with its argument schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    id: CommandId,
    pattern: &'static str,
    placeholders: Vec<Placeholder>,
    segments: Vec<Segment>,
    sensitive: bool,
}

impl CommandTemplate {
    /// Build a template, checking that every `{name}` in the pattern is
    /// declared exactly once and every declared placeholder is used.
    pub fn new(id: CommandId, pattern: &'static str, placeholders: Vec<Placeholder>) -> Result<Self> {
        let invalid = |reason: String| LoRaError::InvalidTemplate {
            command: id.name().to_string(),
            reason,
        };

        let mut segments = Vec::new();
        let mut used = vec![false; placeholders.len()];
        let mut rest = pattern;

        while let Some(open) = rest.find('{') {
            if open > 0 {
                segments.push(Segment::Literal(&rest[..open]));
            }
            let close = rest[open..]
                .find('}')
                .map(|i| open + i)
                .ok_or_else(|| invalid(format!("unclosed placeholder in '{pattern}'")))?;
            let name = &rest[open + 1..close];
            let index = placeholders
                .iter()
                .position(|p| p.name == name)
                .ok_or_else(|| invalid(format!("placeholder '{{{name}}}' is not declared")))?;
            if used[index] {
                return Err(invalid(format!("placeholder '{{{name}}}' appears twice")));
            }
            used[index] = true;
            segments.push(Segment::Slot(index));
            rest = &rest[close + 1..];
        }
        if rest.contains('}') {
            return Err(invalid(format!("stray '}}' in '{pattern}'")));
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest));
        }

        if let Some(unused) = placeholders.iter().zip(&used).find(|(_, u)| !**u) {
            return Err(invalid(format!(
                "declared placeholder '{}' is not in the pattern",
                unused.0.name
            )));
        }

        Ok(CommandTemplate {
            id,
            pattern,
            placeholders,
            segments,
            sensitive: false,
        })
    }

    /// Mark the arguments of this template as secret (redacted in logs).
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn id(&self) -> CommandId {
        self.id
    }

    pub fn pattern(&self) -> &'static str {
        self.pattern
    }

    pub fn placeholders(&self) -> &[Placeholder] {
        &self.placeholders
    }

    pub fn is_sensitive(&self) -> bool {
        self.sensitive
    }

    /// Substitute `args` into the pattern, validating each value.
    pub fn render(&self, args: &Args) -> Result<String> {
        let command = self.id.name();

        if let Some(extra) = args
            .names()
            .find(|name| !self.placeholders.iter().any(|p| p.name == *name))
        {
            return Err(LoRaError::InvalidArgument {
                command: command.to_string(),
                placeholder: extra.to_string(),
                reason: "not a parameter of this command".to_string(),
            });
        }

        let mut line = String::with_capacity(self.pattern.len() + 32);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => line.push_str(text),
                Segment::Slot(index) => {
                    let placeholder = &self.placeholders[*index];
                    let value = args.get(placeholder.name).ok_or_else(|| LoRaError::MissingArgument {
                        command: command.to_string(),
                        placeholder: placeholder.name.to_string(),
                    })?;
                    placeholder
                        .kind
                        .check(value)
                        .map_err(|reason| LoRaError::InvalidArgument {
                            command: command.to_string(),
                            placeholder: placeholder.name.to_string(),
                            reason,
                        })?;
                    line.push_str(value);
                }
            }
        }
        Ok(line)
    }

    /// The pattern with every placeholder shown as `<redacted>`.
    fn redacted(&self) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => *text,
                Segment::Slot(_) => "<redacted>",
            })
            .collect()
    }
}

/// Argument values bound by placeholder name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args {
    values: BTreeMap<String, String>,
}

impl Args {
    pub fn new() -> Self {
        Args::default()
    }

    /// Bind a value; any `Display` type is formatted as it goes on the wire.
    pub fn with(mut self, name: &str, value: impl fmt::Display) -> Self {
        self.values.insert(name.to_string(), value.to_string());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A template with validated arguments, ready to be written.
#[derive(Clone, PartialEq, Eq)]
pub struct Command {
    id: CommandId,
    line: String,
    log_line: Option<String>,
}

impl Command {
    /// Bind and validate arguments. Fails before any I/O can happen.
    pub fn bind(template: &CommandTemplate, args: Args) -> Result<Self> {
        let line = template.render(&args)?;
        let log_line = template.is_sensitive().then(|| template.redacted());
        Ok(Command {
            id: template.id(),
            line,
            log_line,
        })
    }

    pub fn id(&self) -> CommandId {
        self.id
    }

    /// The command text without terminator.
    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.line.as_bytes().to_vec()
    }

    /// The command text safe for logs: key material is replaced.
    pub fn display_line(&self) -> &str {
        self.log_line.as_deref().unwrap_or(&self.line)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("id", &self.id)
            .field("line", &self.display_line())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx_template() -> CommandTemplate {
        CommandTemplate::new(
            CommandId::MacTxConfirmed,
            "mac tx cnf {port} {data}",
            vec![
                Placeholder::new("port", ArgKind::Integer { min: 1, max: 223 }),
                Placeholder::new("data", ArgKind::Hex(HexLen::Even { max: 510 })),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_render_substitutes_in_any_bind_order() {
        let t = tx_template();
        let args = Args::new().with("data", "4142").with("port", 1);
        assert_eq!(t.render(&args).unwrap(), "mac tx cnf 1 4142");
    }

    #[test]
    fn test_render_missing_argument() {
        let t = tx_template();
        let err = t.render(&Args::new().with("port", 1)).unwrap_err();
        assert!(matches!(
            err,
            LoRaError::MissingArgument { ref placeholder, .. } if placeholder == "data"
        ));
    }

    #[test]
    fn test_render_rejects_out_of_range_port() {
        let t = tx_template();
        for port in [0u32, 224, 1000] {
            let err = t
                .render(&Args::new().with("port", port).with("data", "00"))
                .unwrap_err();
            assert!(matches!(err, LoRaError::InvalidArgument { .. }), "port {port}");
        }
    }

    #[test]
    fn test_render_rejects_unknown_argument() {
        let t = tx_template();
        let args = Args::new().with("port", 1).with("data", "00").with("extra", 1);
        assert!(matches!(
            t.render(&args),
            Err(LoRaError::InvalidArgument { ref placeholder, .. }) if placeholder == "extra"
        ));
    }

    #[test]
    fn test_template_rejects_undeclared_placeholder() {
        let err = CommandTemplate::new(CommandId::SysSleep, "sys sleep {ms}", vec![]).unwrap_err();
        assert!(matches!(err, LoRaError::InvalidTemplate { .. }));
    }

    #[test]
    fn test_template_rejects_unused_placeholder() {
        let err = CommandTemplate::new(
            CommandId::SysVersion,
            "sys get ver",
            vec![Placeholder::new("x", ArgKind::Text)],
        )
        .unwrap_err();
        assert!(matches!(err, LoRaError::InvalidTemplate { .. }));
    }

    #[test]
    fn test_template_rejects_unclosed_brace() {
        let err = CommandTemplate::new(
            CommandId::SysSleep,
            "sys sleep {ms",
            vec![Placeholder::new("ms", ArgKind::Text)],
        )
        .unwrap_err();
        assert!(matches!(err, LoRaError::InvalidTemplate { .. }));
    }

    #[test]
    fn test_kind_checks() {
        assert!(ArgKind::Integer { min: 0, max: 5 }.check("5").is_ok());
        assert!(ArgKind::Integer { min: 0, max: 5 }.check("-1").is_err());
        assert!(ArgKind::Integer { min: 0, max: 5 }.check("99999999999999999999999").is_err());
        assert!(ArgKind::Enum(&["on", "off"]).check("on").is_ok());
        assert!(ArgKind::Enum(&["on", "off"]).check("ON").is_err());
        assert!(ArgKind::Text.check("abc").is_ok());
        assert!(ArgKind::Text.check("a b").is_err());
        assert!(ArgKind::Hex(HexLen::Even { max: 4 }).check("414243").is_err());
    }

    #[test]
    fn test_sensitive_command_is_redacted_for_display() {
        let t = CommandTemplate::new(
            CommandId::MacSetAppKey,
            "mac set appkey {key}",
            vec![Placeholder::new("key", ArgKind::Hex(HexLen::Exact(32)))],
        )
        .unwrap()
        .sensitive();
        let cmd = Command::bind(
            &t,
            Args::new().with("key", "000102030405060708090A0B0C0D0E0F"),
        )
        .unwrap();
        assert_eq!(cmd.line(), "mac set appkey 000102030405060708090A0B0C0D0E0F");
        assert_eq!(cmd.display_line(), "mac set appkey <redacted>");
        assert!(!format!("{cmd:?}").contains("0E0F"));
    }
}
