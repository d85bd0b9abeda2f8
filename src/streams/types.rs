//! Stream definition types

use crate::pagination::PaginationConfig;
use crate::partition::DateWindow;
use crate::schema::JsonSchema;
use crate::types::{EntityState, JsonObject, JsonValue, Method, ReplicationMethod};
use serde_json::json;

// ============================================================================
// Stream Definition
// ============================================================================

/// One extractable stream
#[derive(Debug, Clone)]
pub struct StreamDefinition {
    /// Stream name
    pub name: String,
    /// Endpoint path relative to the API root
    pub path: String,
    /// HTTP method
    pub method: Method,
    /// Vendor media type sent as `Accept` and `Content-Type`
    pub media_type: String,
    /// Path of the record array in the response
    pub record_path: String,
    /// Fixed request body fields
    pub body: JsonObject,
    /// Primary key fields
    pub key_properties: Vec<String>,
    /// Replication method
    pub replication_method: ReplicationMethod,
    /// Replication key (incremental streams)
    pub replication_key: Option<String>,
    /// Field that links this stream's records to child streams
    pub id_field: Option<String>,
    /// Parent linkage for child streams
    pub parent: Option<ParentLink>,
    /// Pagination strategy
    pub pagination: PaginationConfig,
    /// Reporting API configuration for report streams
    pub report: Option<ReportDefinition>,
    /// Declared record schema
    pub schema: JsonSchema,
}

impl StreamDefinition {
    /// A v3 list endpoint: POST, all entity states, `nextToken` pagination
    pub fn list(
        name: impl Into<String>,
        path: impl Into<String>,
        media_type: impl Into<String>,
        record_path: impl Into<String>,
    ) -> Self {
        let mut body = JsonObject::new();
        body.insert("stateFilter".to_string(), state_filter());

        Self {
            name: name.into(),
            path: path.into(),
            method: Method::POST,
            media_type: media_type.into(),
            record_path: record_path.into(),
            body,
            key_properties: Vec::new(),
            replication_method: ReplicationMethod::FullTable,
            replication_key: None,
            id_field: None,
            parent: None,
            pagination: PaginationConfig::next_token(),
            report: None,
            schema: JsonSchema::new(),
        }
    }

    /// An asynchronous report stream, incremental on `date`
    pub fn report(name: impl Into<String>, report: ReportDefinition) -> Self {
        Self {
            name: name.into(),
            path: "/reporting/reports".to_string(),
            method: Method::POST,
            media_type: REPORT_MEDIA_TYPE.to_string(),
            record_path: "$".to_string(),
            body: JsonObject::new(),
            key_properties: Vec::new(),
            replication_method: ReplicationMethod::Incremental,
            replication_key: Some("date".to_string()),
            id_field: None,
            parent: None,
            pagination: PaginationConfig::None,
            report: Some(report),
            schema: JsonSchema::new(),
        }
    }

    /// Set primary keys (also marked required in the schema)
    #[must_use]
    pub fn with_keys(mut self, keys: &[&str]) -> Self {
        self.key_properties = keys.iter().map(ToString::to_string).collect();
        self.schema = self.schema.with_required(keys);
        self
    }

    /// Add a fixed body field
    #[must_use]
    pub fn with_body(mut self, key: &str, value: JsonValue) -> Self {
        self.body.insert(key.to_string(), value);
        self
    }

    /// Drop the default state filter
    #[must_use]
    pub fn without_state_filter(mut self) -> Self {
        self.body.remove("stateFilter");
        self
    }

    /// Field child streams filter on
    #[must_use]
    pub fn with_id_field(mut self, field: &str) -> Self {
        self.id_field = Some(field.to_string());
        self
    }

    /// Make this a child of another stream
    #[must_use]
    pub fn with_parent(mut self, link: ParentLink) -> Self {
        self.parent = Some(link);
        self
    }

    /// Override pagination
    #[must_use]
    pub fn with_pagination(mut self, pagination: PaginationConfig) -> Self {
        self.pagination = pagination;
        self
    }

    /// Set the declared schema, keeping required keys
    #[must_use]
    pub fn with_schema(mut self, schema: JsonSchema) -> Self {
        let required = std::mem::take(&mut self.schema.required);
        self.schema = schema;
        for name in required {
            self.schema.add_required(&name);
        }
        self
    }

    /// Check if this is a report stream
    pub fn is_report(&self) -> bool {
        self.report.is_some()
    }

    /// Check if this is a child stream
    pub fn is_child(&self) -> bool {
        self.parent.is_some()
    }

    /// Catalog entry rendered by `discover`
    pub fn catalog_entry(&self) -> JsonValue {
        json!({
            "tap_stream_id": self.name,
            "stream": self.name,
            "schema": self.schema.to_json(),
            "key_properties": self.key_properties,
            "replication_method": self.replication_method,
            "replication_key": self.replication_key,
            "parent_stream": self.parent.as_ref().map(|p| p.parent.clone()),
        })
    }
}

/// `stateFilter` body value covering every entity state
fn state_filter() -> JsonValue {
    let states: Vec<&str> = EntityState::ALL.iter().map(|s| s.as_str()).collect();
    json!({ "include": states })
}

// ============================================================================
// Parent Link
// ============================================================================

/// How a child request carries its batch of parent ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStyle {
    /// `{"<filter_field>": {"include": [ids]}}`, paginated
    IncludeFilter,
    /// `{"<filter_field>": [ids]}`, single response
    IdList,
}

/// Linkage from a child stream to its parent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentLink {
    /// Parent stream name
    pub parent: String,
    /// Request body field holding the batch
    pub filter_field: String,
    /// Field of the child record holding the parent id
    pub parent_key: String,
    /// Request shape
    pub batch_style: BatchStyle,
}

impl ParentLink {
    /// Parent filtered through an `include` filter
    pub fn include(parent: &str, filter_field: &str, parent_key: &str) -> Self {
        Self {
            parent: parent.to_string(),
            filter_field: filter_field.to_string(),
            parent_key: parent_key.to_string(),
            batch_style: BatchStyle::IncludeFilter,
        }
    }

    /// Parent ids sent as a plain list
    pub fn id_list(parent: &str, filter_field: &str, parent_key: &str) -> Self {
        Self {
            batch_style: BatchStyle::IdList,
            ..Self::include(parent, filter_field, parent_key)
        }
    }

    /// Body fragment scoping one request to a batch of parent ids
    pub fn filter_value(&self, ids: &[String]) -> JsonValue {
        match self.batch_style {
            BatchStyle::IncludeFilter => json!({ "include": ids }),
            BatchStyle::IdList => json!(ids),
        }
    }
}

// ============================================================================
// Report Definition
// ============================================================================

/// Media type of the report creation endpoint
pub const REPORT_MEDIA_TYPE: &str = "application/vnd.createasyncreportrequest.v3+json";

/// A report configuration filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFilter {
    /// Filtered column
    pub field: String,
    /// Accepted values
    pub values: Vec<String>,
}

impl ReportFilter {
    /// Create a filter
    pub fn new(field: &str, values: &[&str]) -> Self {
        Self {
            field: field.to_string(),
            values: values.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Reporting API configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportDefinition {
    /// `reportTypeId`
    pub report_type_id: String,
    /// `adProduct`
    pub ad_product: String,
    /// `groupBy`
    pub group_by: Vec<String>,
    /// Requested columns
    pub columns: Vec<String>,
    /// Configuration filters
    pub filters: Vec<ReportFilter>,
}

impl ReportDefinition {
    /// Time unit of every report
    pub const TIME_UNIT: &'static str = "DAILY";
    /// Download format of every report
    pub const FORMAT: &'static str = "GZIP_JSON";

    /// Create a report definition
    pub fn new(report_type_id: &str, ad_product: &str, group_by: &[&str], columns: &[&str]) -> Self {
        Self {
            report_type_id: report_type_id.to_string(),
            ad_product: ad_product.to_string(),
            group_by: group_by.iter().map(ToString::to_string).collect(),
            columns: columns.iter().map(ToString::to_string).collect(),
            filters: Vec::new(),
        }
    }

    /// Add a configuration filter
    #[must_use]
    pub fn with_filter(mut self, filter: ReportFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Report creation payload for one date window
    pub fn payload(&self, name: &str, window: &DateWindow) -> JsonValue {
        let mut configuration = json!({
            "adProduct": self.ad_product,
            "groupBy": self.group_by,
            "columns": self.columns,
            "reportTypeId": self.report_type_id,
            "timeUnit": Self::TIME_UNIT,
            "format": Self::FORMAT,
        });
        if !self.filters.is_empty() {
            configuration["filters"] = self
                .filters
                .iter()
                .map(|f| json!({ "field": f.field, "values": f.values }))
                .collect();
        }

        json!({
            "name": name,
            "startDate": window.start_str(),
            "endDate": window.end_str(),
            "configuration": configuration,
        })
    }
}
