use serde_json::Value;

/// Builder for constructing view queries.
///
/// Mirrors the query parameters accepted by CouchDB's `_view` endpoint.
/// Every field is optional; unset fields fall back to the view definition's
/// defaults (see [`ViewQuery::or`]) and then to the server's defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewQuery {
    /// Only return rows emitted with exactly this key.
    pub key: Option<Value>,

    /// Only return rows emitted with one of these keys, in this order.
    pub keys: Option<Vec<Value>>,

    /// Start returning rows at this key.
    pub start_key: Option<Value>,

    /// Document id to start at, within rows sharing `start_key`.
    pub start_key_doc_id: Option<String>,

    /// Stop returning rows at this key.
    pub end_key: Option<Value>,

    /// Document id to stop at, within rows sharing `end_key`.
    pub end_key_doc_id: Option<String>,

    /// Whether rows matching `end_key` are included.
    pub inclusive_end: Option<bool>,

    /// Return rows in reverse key order.
    pub descending: Option<bool>,

    /// Number of rows to skip before returning results.
    pub skip: Option<usize>,

    /// Maximum number of rows to return.
    pub limit: Option<usize>,

    /// Attach the emitting document to each row.
    pub include_docs: Option<bool>,

    /// Whether to run the reduce function, when the view has one.
    pub reduce: Option<bool>,

    /// Group reduce results by key.
    pub group: Option<bool>,

    /// Group reduce results by this many array-key elements.
    pub group_level: Option<u32>,
}

impl ViewQuery {
    /// Creates a new empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query for rows with exactly this key.
    pub fn for_key(key: impl Into<Value>) -> Self {
        Self {
            key: Some(key.into()),
            ..Default::default()
        }
    }

    /// Creates a query for the key range `[start, end]`.
    pub fn for_range(start: impl Into<Value>, end: impl Into<Value>) -> Self {
        Self {
            start_key: Some(start.into()),
            end_key: Some(end.into()),
            ..Default::default()
        }
    }

    /// Filters by exact key.
    pub fn key(mut self, key: impl Into<Value>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Filters by a list of keys.
    pub fn keys(mut self, keys: Vec<Value>) -> Self {
        self.keys = Some(keys);
        self
    }

    /// Starts at this key.
    pub fn start_key(mut self, key: impl Into<Value>) -> Self {
        self.start_key = Some(key.into());
        self
    }

    /// Starts at this document id within the start key.
    pub fn start_key_doc_id(mut self, id: impl Into<String>) -> Self {
        self.start_key_doc_id = Some(id.into());
        self
    }

    /// Ends at this key.
    pub fn end_key(mut self, key: impl Into<Value>) -> Self {
        self.end_key = Some(key.into());
        self
    }

    /// Ends at this document id within the end key.
    pub fn end_key_doc_id(mut self, id: impl Into<String>) -> Self {
        self.end_key_doc_id = Some(id.into());
        self
    }

    /// Sets whether the end key is inclusive.
    pub fn inclusive_end(mut self, inclusive: bool) -> Self {
        self.inclusive_end = Some(inclusive);
        self
    }

    /// Sets descending order.
    pub fn descending(mut self, descending: bool) -> Self {
        self.descending = Some(descending);
        self
    }

    /// Skips this many rows.
    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Limits the number of rows returned.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Attaches documents to rows.
    pub fn include_docs(mut self, include: bool) -> Self {
        self.include_docs = Some(include);
        self
    }

    /// Enables or disables the reduce step.
    pub fn reduce(mut self, reduce: bool) -> Self {
        self.reduce = Some(reduce);
        self
    }

    /// Enables or disables grouping.
    pub fn group(mut self, group: bool) -> Self {
        self.group = Some(group);
        self
    }

    /// Sets the group level.
    pub fn group_level(mut self, level: u32) -> Self {
        self.group_level = Some(level);
        self
    }

    /// Returns true if rows come back in descending order.
    pub fn is_descending(&self) -> bool {
        self.descending.unwrap_or(false)
    }

    /// Fills every unset field from `defaults`.
    ///
    /// Fields set on `self` always win.
    pub fn or(self, defaults: &ViewQuery) -> Self {
        let d = defaults.clone();
        Self {
            key: self.key.or(d.key),
            keys: self.keys.or(d.keys),
            start_key: self.start_key.or(d.start_key),
            start_key_doc_id: self.start_key_doc_id.or(d.start_key_doc_id),
            end_key: self.end_key.or(d.end_key),
            end_key_doc_id: self.end_key_doc_id.or(d.end_key_doc_id),
            inclusive_end: self.inclusive_end.or(d.inclusive_end),
            descending: self.descending.or(d.descending),
            skip: self.skip.or(d.skip),
            limit: self.limit.or(d.limit),
            include_docs: self.include_docs.or(d.include_docs),
            reduce: self.reduce.or(d.reduce),
            group: self.group.or(d.group),
            group_level: self.group_level.or(d.group_level),
        }
    }

    /// Renders the query as CouchDB URL parameters.
    ///
    /// Key parameters are JSON-encoded, as the server expects. `keys` is not
    /// included here; it travels in a POST body.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        let mut json = |name: &'static str, value: &Option<Value>| {
            if let Some(v) = value {
                params.push((name, v.to_string()));
            }
        };
        json("key", &self.key);
        json("startkey", &self.start_key);
        json("endkey", &self.end_key);

        if let Some(id) = &self.start_key_doc_id {
            params.push(("startkey_docid", id.clone()));
        }
        if let Some(id) = &self.end_key_doc_id {
            params.push(("endkey_docid", id.clone()));
        }
        let flags = [
            ("inclusive_end", self.inclusive_end),
            ("descending", self.descending),
            ("include_docs", self.include_docs),
            ("reduce", self.reduce),
            ("group", self.group),
        ];
        for (name, flag) in flags {
            if let Some(flag) = flag {
                params.push((name, flag.to_string()));
            }
        }
        if let Some(skip) = self.skip {
            params.push(("skip", skip.to_string()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(level) = self.group_level {
            params.push(("group_level", level.to_string()));
        }
        params
    }
}
