use serde_json::{json, Map, Value};

/// Builder for the `where` document of a Parse-style class query.
///
/// Range operators targeting the same field merge into one constraint object,
/// so `greater_than_or_equal` + `less_than_or_equal` produce
/// `{"field": {"$gte": .., "$lte": ..}}`.
#[derive(Clone, Debug)]
pub struct ParseQuery {
    class: String,
    clauses: Map<String, Value>,
    order: Option<String>,
    limit: Option<u32>,
}

impl ParseQuery {
    pub fn new(class: impl Into<String>) -> Self {
        Self { class: class.into(), clauses: Map::new(), order: None, limit: None }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn equal_to(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.clauses.insert(field.to_string(), value.into());
        self
    }

    /// Case-insensitive substring match, the service's `$regex` with the `i`
    /// option.
    pub fn matches(mut self, field: &str, pattern: &str) -> Self {
        self.clauses
            .insert(field.to_string(), json!({"$regex": pattern, "$options": "i"}));
        self
    }

    pub fn greater_than(self, field: &str, value: impl Into<Value>) -> Self {
        self.constrain(field, "$gt", value.into())
    }

    pub fn greater_than_or_equal(self, field: &str, value: impl Into<Value>) -> Self {
        self.constrain(field, "$gte", value.into())
    }

    pub fn less_than(self, field: &str, value: impl Into<Value>) -> Self {
        self.constrain(field, "$lt", value.into())
    }

    pub fn less_than_or_equal(self, field: &str, value: impl Into<Value>) -> Self {
        self.constrain(field, "$lte", value.into())
    }

    pub fn contains_all(mut self, field: &str, values: &[String]) -> Self {
        self.clauses.insert(field.to_string(), json!({"$all": values}));
        self
    }

    /// Disjunction of single-field constraints, AND-ed with the rest of the
    /// query: `{"$or": [{"a": ..}, {"b": ..}]}`.
    pub fn any_of(mut self, alternatives: Vec<(&str, Value)>) -> Self {
        let branches: Vec<Value> = alternatives
            .into_iter()
            .map(|(field, constraint)| json!({ field: constraint }))
            .collect();
        self.clauses.insert("$or".to_string(), Value::Array(branches));
        self
    }

    pub fn ascending(mut self, field: &str) -> Self {
        self.order = Some(field.to_string());
        self
    }

    pub fn descending(mut self, field: &str) -> Self {
        self.order = Some(format!("-{field}"));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn where_document(&self) -> Value {
        Value::Object(self.clauses.clone())
    }

    /// Query-string parameters for `GET /classes/{class}`.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if !self.clauses.is_empty() {
            params.push(("where".to_string(), self.where_document().to_string()));
        }
        if let Some(order) = &self.order {
            params.push(("order".to_string(), order.clone()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }

    fn constrain(mut self, field: &str, operator: &str, value: Value) -> Self {
        let entry = self
            .clauses
            .entry(field.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        match entry {
            Value::Object(constraints) => {
                constraints.insert(operator.to_string(), value);
            }
            other => {
                *other = json!({ operator: value });
            }
        }
        self
    }
}

/// `{"__type": "Date", "iso": ...}` — the service's wire form for dates.
pub fn date_value(datetime: chrono::DateTime<chrono::Utc>) -> Value {
    json!({"__type": "Date", "iso": datetime.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)})
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::{date_value, ParseQuery};

    #[test]
    fn builds_equality_and_regex_clauses() {
        let query = ParseQuery::new("Venue")
            .equal_to("isActive", true)
            .matches("name", "kemang");

        assert_eq!(
            query.where_document(),
            json!({
                "isActive": true,
                "name": {"$regex": "kemang", "$options": "i"},
            })
        );
    }

    #[test]
    fn range_operators_merge_on_the_same_field() {
        let query = ParseQuery::new("Venue")
            .greater_than_or_equal("pricing.hourlyRate", 100_000)
            .less_than_or_equal("pricing.hourlyRate", 200_000);

        assert_eq!(
            query.where_document(),
            json!({"pricing.hourlyRate": {"$gte": 100_000, "$lte": 200_000}})
        );
    }

    #[test]
    fn disjunction_wraps_alternatives_in_or() {
        let constraint = json!({"$regex": "senayan", "$options": "i"});
        let query = ParseQuery::new("Venue").equal_to("isActive", true).any_of(vec![
            ("address.area", constraint.clone()),
            ("address.city", constraint.clone()),
            ("name", constraint.clone()),
        ]);

        let document = query.where_document();
        assert_eq!(document["isActive"], json!(true));
        assert_eq!(document["$or"].as_array().map(Vec::len), Some(3));
        assert_eq!(document["$or"][2], json!({"name": constraint}));
    }

    #[test]
    fn params_carry_where_order_and_limit() {
        let params = ParseQuery::new("Session")
            .equal_to("status", "open")
            .ascending("startTime")
            .limit(20)
            .to_params();

        assert_eq!(params.len(), 3);
        assert_eq!(params[0].0, "where");
        assert!(params[0].1.contains("\"status\":\"open\""));
        assert_eq!(params[1], ("order".to_string(), "startTime".to_string()));
        assert_eq!(params[2], ("limit".to_string(), "20".to_string()));
    }

    #[test]
    fn descending_order_is_prefixed_with_a_dash() {
        let params = ParseQuery::new("Booking").descending("startTime").to_params();
        assert_eq!(params[0], ("order".to_string(), "-startTime".to_string()));
    }

    #[test]
    fn date_values_use_the_wire_wrapper() {
        let datetime = Utc.with_ymd_and_hms(2025, 6, 1, 18, 0, 0).single().expect("valid time");
        let value = date_value(datetime);
        assert_eq!(value["__type"], "Date");
        assert_eq!(value["iso"], "2025-06-01T18:00:00.000Z");
    }
}
