use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{CouchDatabase, DocId, Document, Result, ViewQuery};

/// A named map/reduce view stored in a design document.
///
/// Definitions are built once at setup time and never change afterwards;
/// they are identified by `(design, name)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewDefinition {
    design: String,
    name: String,
    map_fun: String,
    reduce_fun: Option<String>,
    language: String,
    options: Option<Value>,
    defaults: ViewQuery,
}

impl ViewDefinition {
    /// Creates a map-only JavaScript view.
    ///
    /// A `_design/` prefix on `design` is accepted and stripped. Function
    /// bodies are dedented so indentation in Rust string literals does not
    /// end up on the server.
    pub fn new(
        design: impl Into<String>,
        name: impl Into<String>,
        map_fun: impl AsRef<str>,
    ) -> Self {
        let design = design.into();
        let design = design
            .strip_prefix(DocId::DESIGN_PREFIX)
            .map(str::to_string)
            .unwrap_or(design);
        Self {
            design,
            name: name.into(),
            map_fun: dedent(map_fun.as_ref()),
            reduce_fun: None,
            language: "javascript".to_string(),
            options: None,
            defaults: ViewQuery::default(),
        }
    }

    /// Adds a reduce function.
    pub fn with_reduce(mut self, reduce_fun: impl AsRef<str>) -> Self {
        self.reduce_fun = Some(dedent(reduce_fun.as_ref()));
        self
    }

    /// Sets the view server language.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Sets server-side view options (e.g. `{"collation": "raw"}`).
    pub fn with_options(mut self, options: Value) -> Self {
        self.options = Some(options);
        self
    }

    /// Sets the query options applied whenever this view is queried.
    pub fn with_defaults(mut self, defaults: ViewQuery) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn design(&self) -> &str {
        &self.design
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn map_fun(&self) -> &str {
        &self.map_fun
    }

    pub fn reduce_fun(&self) -> Option<&str> {
        self.reduce_fun.as_deref()
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn options(&self) -> Option<&Value> {
        self.options.as_ref()
    }

    pub fn defaults(&self) -> &ViewQuery {
        &self.defaults
    }

    /// Returns the id of the design document holding this view.
    pub fn design_doc_id(&self) -> DocId {
        DocId::design(&self.design)
    }

    /// Returns the `views.<name>` entry as stored in the design document.
    pub fn to_view_json(&self) -> Value {
        let mut entry = Map::new();
        entry.insert("map".to_string(), Value::String(self.map_fun.clone()));
        if let Some(reduce) = &self.reduce_fun {
            entry.insert("reduce".to_string(), Value::String(reduce.clone()));
        }
        if let Some(options) = &self.options {
            entry.insert("options".to_string(), options.clone());
        }
        Value::Object(entry)
    }

    /// Binds this definition to a database handle so it can be queried.
    pub fn bind<'a, D: CouchDatabase>(&'a self, db: &'a D) -> BoundView<'a, D> {
        BoundView {
            definition: self,
            db,
        }
    }
}

fn dedent(source: &str) -> String {
    let source = source.trim_start_matches(['\n', '\r']).trim_end();
    let indent = source
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);
    source
        .lines()
        .map(|line| line.get(indent..).unwrap_or_else(|| line.trim_start()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A single row of a view result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Id of the emitting document (absent on reduced rows).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub key: Value,
    #[serde(default)]
    pub value: Value,
    /// The emitting document, when queried with `include_docs`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<Document>,
}

/// The result of querying a view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewResults {
    #[serde(default)]
    pub total_rows: usize,
    #[serde(default)]
    pub offset: usize,
    pub rows: Vec<Row>,
}

impl ViewResults {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl IntoIterator for ViewResults {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

/// A view definition composed with the database it runs against.
///
/// Every query goes through the definition's defaults first.
pub struct BoundView<'a, D> {
    definition: &'a ViewDefinition,
    db: &'a D,
}

impl<'a, D: CouchDatabase> BoundView<'a, D> {
    pub fn definition(&self) -> &'a ViewDefinition {
        self.definition
    }

    pub fn database(&self) -> &'a D {
        self.db
    }

    /// Runs the view with `query` layered over the definition's defaults.
    pub async fn query(&self, query: ViewQuery) -> Result<ViewResults> {
        let query = query.or(self.definition.defaults());
        self.db
            .query(self.definition.design(), self.definition.name(), &query)
            .await
    }

    /// Runs the view with its defaults only.
    pub async fn all(&self) -> Result<ViewResults> {
        self.query(ViewQuery::new()).await
    }

    /// Returns the rows emitted with exactly `key`.
    pub async fn get(&self, key: impl Into<Value>) -> Result<Vec<Row>> {
        Ok(self.query(ViewQuery::for_key(key)).await?.rows)
    }

    /// Returns the rows with keys in `[start, end]`.
    pub async fn range(&self, start: impl Into<Value>, end: impl Into<Value>) -> Result<Vec<Row>> {
        Ok(self.query(ViewQuery::for_range(start, end)).await?.rows)
    }
}
