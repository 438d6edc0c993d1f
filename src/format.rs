//! Label and message formatting.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::config::{self, LabelFormatterFn, MessageFormatterFn, Options};
use crate::error::ConfigError;
use crate::path::without_brackets;
use crate::record::HasValidationSpec;

static ORDINAL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{(\d+)\}").unwrap());

/// Replaces `{0}`, `{1}`, ... with the matching argument. Placeholders without
/// an argument are left as written.
pub fn format_ordinal(template: &str, args: &[String]) -> String {
    ORDINAL_RE
        .replace_all(template, |caps: &Captures<'_>| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|i| args.get(i))
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// `attributeName` or `attribute_name` → `Attribute name`.
///
/// The first word character is upper-cased; every upper-case letter and every
/// word character that starts a word becomes a space plus its lower-case form;
/// underscores become spaces.
pub fn sentence_case(attr: &str) -> String {
    let mut out = String::with_capacity(attr.len() + 4);
    let mut prev_is_word = false;

    for (i, c) in attr.chars().enumerate() {
        let is_word = c.is_ascii_alphanumeric() || c == '_';
        if i == 0 && is_word {
            out.extend(c.to_uppercase());
        } else if c.is_ascii_uppercase() || (is_word && !prev_is_word) {
            out.push(' ');
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
        prev_is_word = is_word;
    }

    out.replace('_', " ")
}

/// Looks the attribute up in the record's labels, falling back to
/// [`sentence_case`].
pub fn record_label(attr: &str, record: &dyn HasValidationSpec) -> String {
    record
        .labels()
        .and_then(|labels| labels.get(attr))
        .cloned()
        .unwrap_or_else(|| sentence_case(attr))
}

/// The label and message formatters selected by an [`Options`] value.
#[derive(Clone)]
pub struct Formatters {
    pub label: LabelFormatterFn,
    pub message: MessageFormatterFn,
}

impl Formatters {
    /// Looks up both formatters by name, failing on an unknown name.
    pub fn resolve(options: &Options) -> Result<Formatters, ConfigError> {
        Ok(Formatters {
            label: config::label_formatter(&options.label_formatter)?,
            message: config::message_formatter(&options.message_formatter)?,
        })
    }

    /// Labels are computed without bracket segments, so `tags[1]` and
    /// `tags[]` are labelled like `tags`.
    pub fn format_label(&self, attr: &str, record: &dyn HasValidationSpec) -> String {
        (self.label)(&without_brackets(attr), record)
    }

    pub fn format(&self, template: &str, args: &[String]) -> String {
        (self.message)(template, args)
    }
}
