use serde::Serialize;

/// Row filter attached to a change subscription, rendered as
/// `column=op.value` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseFilter {
    pub column: String,
    pub operator: FilterOperator,
    pub value: String,
}

impl DatabaseFilter {
    pub fn new(column: &str, operator: FilterOperator, value: &str) -> Self {
        Self {
            column: column.to_string(),
            operator,
            value: value.to_string(),
        }
    }

    pub fn to_filter_string(&self) -> String {
        match self.operator {
            FilterOperator::In => format!("{}=in.({})", self.column, self.value),
            _ => format!("{}={}.{}", self.column, self.operator, self.value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FilterOperator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
}

impl std::fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Neq => "neq",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::In => "in",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_strings() {
        let eq = DatabaseFilter::new("household_id", FilterOperator::Eq, "h1");
        assert_eq!(eq.to_filter_string(), "household_id=eq.h1");

        let list = DatabaseFilter::new("household_id", FilterOperator::In, "h1,h2");
        assert_eq!(list.to_filter_string(), "household_id=in.(h1,h2)");
    }
}
