use crate::entity::Entity;
use crate::extract::DataFlow;
use crate::relationship::Relationship;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
pub struct TableRow {
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Tabled)]
struct EntityRow<'a> {
    #[tabled(rename = "Kind")]
    kind: &'a str,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Source")]
    source_path: &'a str,
    #[tabled(rename = "Lines")]
    lines: String,
}

#[derive(Tabled)]
struct RelationshipRow<'a> {
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Edge")]
    edge_type: &'a str,
    #[tabled(rename = "Target")]
    target: String,
}

#[derive(Tabled)]
struct DataFlowRow<'a> {
    #[tabled(rename = "Value")]
    value: &'a str,
    #[tabled(rename = "Flows To")]
    target: &'a str,
    #[tabled(rename = "In")]
    scope: String,
    #[tabled(rename = "Line")]
    line: u32,
}

#[derive(Default)]
pub struct TableBuilder {
    rows: Vec<TableRow>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row(&mut self, label: &str, value: &str) {
        self.rows.push(TableRow {
            metric: label.to_string(),
            value: value.to_string(),
        });
    }

    pub fn build(&self) -> String {
        if self.rows.is_empty() {
            return String::new();
        }
        Table::new(&self.rows).with(Style::rounded()).to_string()
    }
}

pub fn stats_table(stats: &[(&str, &str)]) -> String {
    let mut builder = TableBuilder::new();
    for (label, value) in stats {
        builder.add_row(label, value);
    }
    builder.build()
}

pub fn entity_table(entities: &[Entity]) -> String {
    let rows = entities.iter().map(|e| EntityRow {
        kind: e.kind().as_str(),
        name: e.key.display_name(),
        source_path: e.source_path(),
        lines: format!("{}-{}", e.line_start, e.line_end),
    });
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn relationship_table(relationships: &[Relationship]) -> String {
    let rows = relationships.iter().map(|r| RelationshipRow {
        source: r.source.display_name(),
        edge_type: r.edge_type.as_str(),
        target: r.target.display_name(),
    });
    Table::new(rows).with(Style::rounded()).to_string()
}

pub fn data_flow_table(flows: &[DataFlow]) -> String {
    let rows = flows.iter().map(|f| DataFlowRow {
        value: &f.value,
        target: &f.target,
        scope: format!("{}@{}", f.scope.display_name(), f.scope.source_path),
        line: f.line,
    });
    Table::new(rows).with(Style::rounded()).to_string()
}
