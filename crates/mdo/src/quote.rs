//! Identifier and literal quoting for the MySQL dialect.

use crate::value::Value;
use std::fmt::Write;

/// Quoting capability required by every statement builder.
///
/// All methods have MySQL defaults, so an engine only overrides what its
/// wire format actually needs.
pub trait Quote: Send + Sync {
    /// Quote a (possibly dotted) identifier. `*` segments stay bare.
    fn quote_identifier(&self, name: &str, auto_quote: bool) -> String {
        if !auto_quote {
            return name.to_string();
        }
        let mut out = String::with_capacity(name.len() + 2);
        for (i, segment) in name.split('.').enumerate() {
            if i > 0 {
                out.push('.');
            }
            if segment == "*" {
                out.push('*');
            } else {
                out.push('`');
                out.push_str(&segment.replace('`', "``"));
                out.push('`');
            }
        }
        out
    }

    /// Literal-safe encoding of a value.
    fn quote(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(v) => (if *v { "1" } else { "0" }).to_string(),
            Value::Int(v) => v.to_string(),
            Value::UInt(v) => v.to_string(),
            Value::Float(v) if v.is_finite() => v.to_string(),
            Value::Float(_) => "NULL".to_string(),
            Value::Text(s) => quote_str(s),
            Value::Bytes(b) => {
                let mut out = String::with_capacity(b.len() * 2 + 3);
                out.push_str("X'");
                for byte in b {
                    let _ = write!(out, "{byte:02X}");
                }
                out.push('\'');
                out
            }
            Value::Date(d) => format!("'{}'", d.format("%Y-%m-%d")),
            Value::DateTime(dt) => format!("'{}'", dt.format("%Y-%m-%d %H:%M:%S%.f")),
            Value::Uuid(u) => format!("'{}'", u.hyphenated()),
            Value::Json(j) => quote_str(&j.to_string()),
            #[cfg(feature = "rust_decimal")]
            Value::Decimal(d) => d.to_string(),
            Value::List(items) => self.quote_array(items),
            Value::Expr(e) => e.as_str().to_string(),
        }
    }

    /// Replace every `?` placeholder in `template` with the quoted value.
    fn quote_into(&self, template: &str, value: &Value) -> String {
        template.replace('?', &self.quote(value))
    }

    /// Comma-joined quoted values.
    fn quote_array(&self, values: &[Value]) -> String {
        values
            .iter()
            .map(|v| self.quote(v))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// `` `schema`.`table` AS `alias` `` (alias omitted when redundant).
    fn quote_table_as(&self, table: &str, alias: Option<&str>) -> String {
        quote_as(self, table, alias)
    }

    /// `` `t`.`column` AS `alias` `` (alias omitted when redundant).
    fn quote_column_as(&self, column: &str, alias: Option<&str>) -> String {
        quote_as(self, column, alias)
    }
}

fn quote_as<Q: Quote + ?Sized>(quoter: &Q, ident: &str, alias: Option<&str>) -> String {
    let mut out = quoter.quote_identifier(ident, true);
    if let Some(alias) = alias {
        let last = ident.rsplit('.').next().unwrap_or(ident);
        if !alias.is_empty() && last != alias {
            out.push_str(" AS ");
            out.push_str(&quoter.quote_identifier(alias, true));
        }
    }
    out
}

/// Single-quote a string with MySQL escaping rules.
pub fn quote_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\x1a' => out.push_str("\\Z"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Stock MySQL quoter with no connection attached.
#[derive(Clone, Copy, Debug, Default)]
pub struct MySqlDialect;

impl Quote for MySqlDialect {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Expr;
    use chrono::NaiveDate;

    #[test]
    fn test_quote_identifier() {
        let q = MySqlDialect;
        assert_eq!(q.quote_identifier("users", true), "`users`");
        assert_eq!(q.quote_identifier("db.users", true), "`db`.`users`");
        assert_eq!(q.quote_identifier("u.*", true), "`u`.*");
        assert_eq!(q.quote_identifier("we`ird", true), "`we``ird`");
        assert_eq!(q.quote_identifier("raw.name", false), "raw.name");
    }

    #[test]
    fn test_quote_literals() {
        let q = MySqlDialect;
        assert_eq!(q.quote(&Value::Null), "NULL");
        assert_eq!(q.quote(&Value::from(true)), "1");
        assert_eq!(q.quote(&Value::from(-7i32)), "-7");
        assert_eq!(q.quote(&Value::from(2.5f64)), "2.5");
        assert_eq!(q.quote(&Value::from("it's")), "'it\\'s'");
        assert_eq!(q.quote(&Value::from("a\nb")), "'a\\nb'");
        assert_eq!(q.quote(&Value::from(vec![0xABu8, 0x01])), "X'AB01'");
        assert_eq!(q.quote(&Value::from(Expr::new("NOW()"))), "NOW()");
        let d = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert_eq!(q.quote(&Value::from(d)), "'2024-01-31'");
        assert_eq!(
            q.quote(&Value::from(d.and_hms_opt(8, 5, 0).unwrap())),
            "'2024-01-31 08:05:00'"
        );
    }

    #[test]
    fn test_quote_into_and_array() {
        let q = MySqlDialect;
        assert_eq!(q.quote_into("id = ?", &Value::from(5)), "id = 5");
        assert_eq!(
            q.quote_into("id IN (?)", &Value::list([1, 2, 3])),
            "id IN (1, 2, 3)"
        );
        assert_eq!(
            q.quote_array(&[Value::from("a"), Value::Null]),
            "'a', NULL"
        );
    }

    #[test]
    fn test_quote_as() {
        let q = MySqlDialect;
        assert_eq!(q.quote_table_as("users", Some("users")), "`users`");
        assert_eq!(q.quote_table_as("users", Some("u")), "`users` AS `u`");
        assert_eq!(q.quote_column_as("o.id", Some("id")), "`o`.`id`");
        assert_eq!(q.quote_column_as("o.id", Some("oid")), "`o`.`id` AS `oid`");
    }
}
