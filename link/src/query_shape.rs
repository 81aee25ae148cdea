//! Query shape analysis for result updatability.
//!
//! A result may only be edited in place when the query that produced it reads
//! from exactly one base table through plain column references. Parsing uses
//! sqlparser-rs with the MySQL dialect so quoting and schema-qualified names
//! are handled correctly.

use sqlparser::ast::{
    Expr, GroupByExpr, ObjectName, ObjectNamePart, Query, Select, SelectItem, SetExpr, Statement,
    TableFactor,
};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;

use crate::models::ColumnDescriptor;

/// Structural facts about a query, derived once from its text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryShape {
    is_query: bool,
    base_table: Option<String>,
}

impl QueryShape {
    /// Analyze `sql`. Text that does not parse, or that is not a single
    /// query statement, yields a shape without a base table.
    pub fn parse(sql: &str) -> Self {
        let dialect = MySqlDialect {};
        let statements = match Parser::parse_sql(&dialect, sql) {
            Ok(statements) => statements,
            Err(e) => {
                log::debug!("[shell-link] Query shape unavailable: {}", e);
                return Self::default();
            },
        };

        match statements.as_slice() {
            [Statement::Query(query)] => Self {
                is_query: true,
                base_table: single_table_of_query(query),
            },
            _ => Self::default(),
        }
    }

    /// Whether the text is exactly one row-returning query statement.
    pub fn is_query(&self) -> bool {
        self.is_query
    }

    /// The single base table the query reads from, if its shape qualifies.
    pub fn base_table(&self) -> Option<&str> {
        self.base_table.as_deref()
    }

    pub fn is_single_table(&self) -> bool {
        self.base_table.is_some()
    }

    /// Whether rows shaped by this query can be written back: the shape
    /// qualifies and the captured columns include a primary key column.
    pub fn permits_updates(&self, columns: &[ColumnDescriptor]) -> bool {
        self.is_single_table() && columns.iter().any(ColumnDescriptor::is_primary_key)
    }
}

fn single_table_of_query(query: &Query) -> Option<String> {
    if query.with.is_some() {
        return None;
    }
    match query.body.as_ref() {
        SetExpr::Select(select) => single_table_of_select(select),
        SetExpr::Query(inner) => single_table_of_query(inner),
        _ => None,
    }
}

fn single_table_of_select(select: &Select) -> Option<String> {
    if select.distinct.is_some() || select.having.is_some() {
        return None;
    }
    let grouped = match &select.group_by {
        GroupByExpr::All(_) => true,
        GroupByExpr::Expressions(exprs, _) => !exprs.is_empty(),
    };
    if grouped {
        return None;
    }
    if !select.projection.iter().all(is_plain_projection) {
        return None;
    }

    let [table] = select.from.as_slice() else {
        return None;
    };
    if !table.joins.is_empty() {
        return None;
    }

    match &table.relation {
        TableFactor::Table { name, args: None, .. } => {
            let table_name = object_name_to_string(name)?;
            if table_name.eq_ignore_ascii_case("dual") {
                return None;
            }
            Some(table_name)
        },
        _ => None,
    }
}

fn is_plain_projection(item: &SelectItem) -> bool {
    match item {
        SelectItem::Wildcard(_) | SelectItem::QualifiedWildcard(_, _) => true,
        SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } => {
            matches!(expr, Expr::Identifier(_) | Expr::CompoundIdentifier(_))
        },
    }
}

fn object_name_to_string(name: &ObjectName) -> Option<String> {
    let parts = name
        .0
        .iter()
        .filter_map(|part| match part {
            ObjectNamePart::Identifier(ident) => Some(ident.value.clone()),
            #[allow(unreachable_patterns)]
            _ => None,
        })
        .collect::<Vec<_>>();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("."))
    }
}
