use rusqlite::types::ToSql;

/// Incrementally built `WHERE` clause with positional parameters.
#[derive(Default)]
pub(crate) struct SqlFilter {
    conditions: Vec<String>,
    args: Vec<Box<dyn ToSql>>,
}

impl SqlFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `column <op> ?n`
    pub fn cmp<T: ToSql + 'static>(&mut self, column: &str, op: &str, value: T) -> &mut Self {
        self.args.push(Box::new(value));
        self.conditions
            .push(format!("{column} {op} ?{}", self.args.len()));
        self
    }

    pub fn eq<T: ToSql + 'static>(&mut self, column: &str, value: T) -> &mut Self {
        self.cmp(column, "=", value)
    }

    /// `column IN (...)`. An empty set matches nothing.
    pub fn any_of(&mut self, column: &str, values: Vec<String>) -> &mut Self {
        if values.is_empty() {
            self.conditions.push("0".into());
            return self;
        }
        let mut placeholders = Vec::with_capacity(values.len());
        for value in values {
            self.args.push(Box::new(value));
            placeholders.push(format!("?{}", self.args.len()));
        }
        self.conditions
            .push(format!("{column} IN ({})", placeholders.join(", ")));
        self
    }

    pub fn raw(&mut self, condition: &str) -> &mut Self {
        self.conditions.push(condition.to_string());
        self
    }

    pub fn where_sql(&self) -> String {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub fn params(&self) -> impl rusqlite::Params + '_ {
        rusqlite::params_from_iter(self.args.iter().map(|a| a.as_ref()))
    }
}

/// `LIMIT`/`OFFSET` pair for paginated listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u32,
    pub offset: u32,
}

impl Page {
    pub fn new(page: u32, limit: u32) -> Self {
        let page = page.max(1);
        Self {
            limit,
            offset: (page - 1) * limit,
        }
    }

    pub fn first(limit: u32) -> Self {
        Self { limit, offset: 0 }
    }

    pub(crate) fn sql(page: Option<Page>) -> String {
        match page {
            Some(p) => format!(" LIMIT {} OFFSET {}", p.limit, p.offset),
            None => String::new(),
        }
    }
}
