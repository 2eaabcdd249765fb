use std::fmt;

/// A fully qualified MySQL table name consisting of a schema (database) and
/// table name.
///
/// Provides quoting helpers for building queries against the source server.
#[derive(Debug, Clone, Eq, PartialEq, PartialOrd, Ord)]
pub struct TableName {
    /// The schema (database) name containing the table.
    pub schema: String,
    /// The name of the table within the schema.
    pub name: String,
}

impl TableName {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> TableName {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Returns the table name as a properly quoted MySQL identifier.
    ///
    /// Schema and table names are escaped according to MySQL identifier
    /// quoting rules using backticks.
    pub fn as_quoted_identifier(&self) -> String {
        format!(
            "`{}`.`{}`",
            escape_identifier(&self.schema),
            escape_identifier(&self.name)
        )
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("{0}.{1}", self.schema, self.name))
    }
}

/// Escapes backticks inside an identifier by doubling them.
fn escape_identifier(identifier: &str) -> String {
    identifier.replace('`', "``")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_identifier() {
        let table = TableName::new("shop", "orders");
        assert_eq!(table.as_quoted_identifier(), "`shop`.`orders`");
    }

    #[test]
    fn test_quoted_identifier_escapes_backticks() {
        let table = TableName::new("shop", "odd`name");
        assert_eq!(table.as_quoted_identifier(), "`shop`.`odd``name`");
    }

    #[test]
    fn test_display() {
        let table = TableName::new("shop", "orders");
        assert_eq!(table.to_string(), "shop.orders");
    }
}
