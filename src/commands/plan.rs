//! # Plan Command Implementation
//!
//! This module implements the `plan` subcommand, which displays the action
//! the clone engine takes for every field of each catalog type, as a tree.
//!
//! This command is a safe, read-only operation that does not modify any files.

use anyhow::Result;
use clap::Args;
use ptree::{print_tree, TreeItem};
use std::path::PathBuf;

use template_clone::catalog::{CollectionPolicy, FieldDescriptor, FieldPlan, TypeCatalog};

use super::{load_catalog, load_config};

/// Show the clone plan of a catalog
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Path to the type catalog YAML file.
    #[arg(long, value_name = "FILE", env = "TEMPLATE_CLONE_CATALOG")]
    pub catalog: PathBuf,

    /// Path to a clone configuration YAML file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Only show this type.
    #[arg(long = "type", value_name = "TYPE")]
    pub type_name: Option<String>,
}

/// Execute the `plan` command.
pub fn execute(args: PlanArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let catalog = load_catalog(&args.catalog, &config)?;

    let tree_root = build_plan_tree(&catalog, args.type_name.as_deref())?;
    print_tree(&tree_root).map_err(|e| anyhow::anyhow!("Failed to display plan: {}", e))?;

    Ok(())
}

/// Build the plan tree: catalog → types → fields.
fn build_plan_tree(catalog: &TypeCatalog, only: Option<&str>) -> Result<TreeNode> {
    if let Some(name) = only {
        if !catalog.has_type(name) {
            return Err(anyhow::anyhow!("Unknown type: {}", name));
        }
    }

    let mut types = Vec::new();
    for type_name in catalog.type_names() {
        if only.is_some_and(|name| name != type_name) {
            continue;
        }
        let fields = catalog
            .fields_of(type_name)?
            .into_iter()
            .map(|field| TreeNode::leaf(field_label(catalog, field)))
            .collect();
        types.push(TreeNode {
            label: type_name.to_string(),
            children: fields,
        });
    }

    Ok(TreeNode {
        label: "Clone plan".to_string(),
        children: types,
    })
}

fn field_label(catalog: &TypeCatalog, field: &FieldDescriptor) -> String {
    let mut label = format!("{}: {}", field.name, field.plan.describe());

    if let Some(target) = &field.target {
        if matches!(
            field.plan,
            FieldPlan::CloneRelation | FieldPlan::LinkRelation | FieldPlan::CopyCollection(_)
        ) {
            label.push_str(&format!(" → {}", target));
        }
    }

    if field.plan == FieldPlan::CopyCollection(CollectionPolicy::AutoLink) {
        match catalog.linked_fields_of(field.id) {
            Ok(Some(linked)) => {
                label.push_str(&format!(" (sets {} from {})", linked.other, linked.own))
            }
            Ok(None) => label.push_str(" (unpaired, skipped)"),
            Err(e) => label.push_str(&format!(" ({})", e)),
        }
    }

    label
}

/// Tree node structure for ptree visualization
#[derive(Clone, Debug)]
struct TreeNode {
    label: String,
    children: Vec<TreeNode>,
}

impl TreeNode {
    fn leaf(label: String) -> Self {
        Self {
            label,
            children: vec![],
        }
    }
}

impl TreeItem for TreeNode {
    type Child = TreeNode;

    fn write_self<W: std::io::Write>(
        &self,
        f: &mut W,
        _style: &ptree::Style,
    ) -> std::io::Result<()> {
        write!(f, "{}", self.label)
    }

    fn children(&self) -> std::borrow::Cow<'_, [Self::Child]> {
        std::borrow::Cow::Borrowed(&self.children)
    }
}
