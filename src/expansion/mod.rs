use std::borrow::Cow;

mod render;
mod scanner;

pub(crate) use render::quote_identifier;
use render::{identifier_from_param, marker_list};
use scanner::{Delimiter, Marker, Token, next_token};

use crate::error::SqlRegistryError;
use crate::types::{Arg, MapKey, Param};

/// A template with every `??` group rewritten to scalar `?` markers, plus the flattened
/// parameters in left-to-right marker order.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpandedQuery<'a> {
    pub sql: Cow<'a, str>,
    pub params: Vec<Param>,
}

/// Expand `?`/`??` placeholders against positional arguments.
///
/// Each marker, optionally wrapped in a matching delimiter, consumes the next argument:
///
/// | token          | argument         | emitted SQL                 | parameters added |
/// |----------------|------------------|-----------------------------|------------------|
/// | `?` (any wrap) | scalar           | `?`                         | the scalar       |
/// | `` `??` ``     | non-empty list/map | `` `a`, `b` ``            | none             |
/// | `'??'`/`"??"`  | non-empty list/map | `?, ?`                    | each value       |
/// | `??`           | non-empty string-keyed map | `` `k` = ?, … `` | each value       |
///
/// Markers inside string literals are not special-cased. Returns a borrowed `Cow` when the
/// template needs no rewriting.
///
/// ```rust
/// use sql_registry::prelude::*;
///
/// let expanded = expand_placeholders(
///     "UPDATE `t` SET ?? WHERE `id` IN ('??')",
///     &[Arg::map([("a", 1), ("b", 2)]), Arg::list([7, 8])],
/// )?;
/// assert_eq!(expanded.sql, "UPDATE `t` SET `a` = ?, `b` = ? WHERE `id` IN (?, ?)");
/// assert_eq!(expanded.params.len(), 4);
/// # Ok::<(), SqlRegistryError>(())
/// ```
///
/// # Errors
///
/// Returns `SqlRegistryError::ArgumentError` when the argument count differs from the marker
/// count, when a `??` marker receives a scalar or an empty collection, when a `?` marker
/// receives a collection, or when a bare `??` mapping has a non-string key.
pub fn expand_placeholders<'a>(
    template: &'a str,
    args: &[Arg],
) -> Result<ExpandedQuery<'a>, SqlRegistryError> {
    let bytes = template.as_bytes();
    let mut out: Option<String> = None;
    let mut params = Vec::with_capacity(args.len());
    let mut copied_to = 0;
    let mut idx = 0;
    let mut consumed = 0;

    while let Some(token) = next_token(bytes, idx) {
        let arg = args.get(consumed).ok_or_else(|| {
            SqlRegistryError::ArgumentError(format!(
                "template has more placeholders than the {} supplied arguments",
                args.len()
            ))
        })?;
        consumed += 1;

        if let Some(replacement) = expand_token(&token, arg, consumed, &mut params)? {
            let buf = out.get_or_insert_with(|| String::with_capacity(template.len() + 16));
            buf.push_str(&template[copied_to..token.start]);
            buf.push_str(&replacement);
            copied_to = token.end;
        }
        idx = token.end;
    }

    if consumed != args.len() {
        return Err(SqlRegistryError::ArgumentError(format!(
            "{} arguments supplied but the template has {consumed} placeholders",
            args.len()
        )));
    }

    let sql = match out {
        Some(mut buf) => {
            buf.push_str(&template[copied_to..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(template),
    };
    Ok(ExpandedQuery { sql, params })
}

/// Append the token's parameters and return the SQL to splice in, or `None` when the token
/// text is already a bare `?`.
fn expand_token(
    token: &Token,
    arg: &Arg,
    position: usize,
    params: &mut Vec<Param>,
) -> Result<Option<String>, SqlRegistryError> {
    match token.marker {
        Marker::Scalar => {
            let Arg::Value(param) = arg else {
                return Err(SqlRegistryError::ArgumentError(format!(
                    "placeholder {position} is `?` and expects a scalar, got a {}",
                    arg.kind()
                )));
            };
            params.push(param.clone());
            Ok(token.delimiter.map(|_| "?".to_string()))
        }
        Marker::Group => {
            let values = group_values(arg, position)?;
            match token.delimiter {
                Some(Delimiter::Backtick) => {
                    let idents = values
                        .iter()
                        .map(|param| identifier_from_param(param))
                        .collect::<Result<Vec<_>, _>>()?;
                    Ok(Some(idents.join(", ")))
                }
                Some(Delimiter::SingleQuote | Delimiter::DoubleQuote) => {
                    params.extend(values.iter().map(|param| (*param).clone()));
                    Ok(Some(marker_list(values.len())))
                }
                None => assignments(arg, position, params).map(Some),
            }
        }
    }
}

fn group_values(arg: &Arg, position: usize) -> Result<Vec<&Param>, SqlRegistryError> {
    let values: Vec<&Param> = match arg {
        Arg::List(items) => items.iter().collect(),
        Arg::Map(entries) => entries.iter().map(|(_, v)| v).collect(),
        Arg::Value(param) => {
            return Err(SqlRegistryError::ArgumentError(format!(
                "placeholder {position} is `??` and expects a list or map, got a {} scalar",
                param.kind()
            )));
        }
    };
    if values.is_empty() {
        return Err(SqlRegistryError::ArgumentError(format!(
            "placeholder {position} is `??` and its {} argument is empty",
            arg.kind()
        )));
    }
    Ok(values)
}

fn assignments(
    arg: &Arg,
    position: usize,
    params: &mut Vec<Param>,
) -> Result<String, SqlRegistryError> {
    let keyed: Vec<(MapKey, &Param)> = match arg {
        Arg::Map(entries) => entries.iter().map(|(k, v)| (k.clone(), v)).collect(),
        Arg::List(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (MapKey::Int(i64::try_from(i).unwrap_or(i64::MAX)), v))
            .collect(),
        Arg::Value(param) => {
            return Err(SqlRegistryError::ArgumentError(format!(
                "placeholder {position} is a bare `??` and expects a map, got a {} scalar",
                param.kind()
            )));
        }
    };

    let mut parts = Vec::with_capacity(keyed.len());
    for (key, value) in keyed {
        let MapKey::Str(name) = &key else {
            return Err(SqlRegistryError::ArgumentError(format!(
                "placeholder {position} is a bare `??` and needs string keys; key `{key}` is not a string"
            )));
        };
        parts.push(format!("{} = ?", quote_identifier(name)));
        params.push(value.clone());
    }
    Ok(parts.join(", "))
}
