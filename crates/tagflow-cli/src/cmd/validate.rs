use anyhow::Context;
use tagflow_core::request::parse_request;
use tagflow_core::types::FilterExpression;

use super::PayloadArgs;
use crate::output::{print_json, print_table};

pub fn run(input: &PayloadArgs, json: bool) -> anyhow::Result<()> {
    let payload = input.read()?;
    let request = parse_request(&payload).context("invalid trigger payload")?;

    if json {
        return print_json(&request);
    }

    let mode = match &request.expression {
        FilterExpression::Or(_) => "or (any condition)",
        FilterExpression::And(_) => "and (all conditions)",
    };
    println!("Action: {}", request.action);
    println!("Mode:   {mode}");
    println!();
    let rows = request
        .expression
        .conditions()
        .iter()
        .map(|c| vec![c.key().to_string(), c.values().join(", ")])
        .collect();
    print_table(&["KEY", "VALUES"], rows);
    Ok(())
}
