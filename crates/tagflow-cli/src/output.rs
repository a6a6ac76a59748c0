use serde::Serialize;
use tagflow_core::dispatch::Outcome;
use tagflow_core::RunReport;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    // Calculate column widths
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let header_row: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:width$}", h, width = widths[i]))
        .collect();
    println!("{}", header_row.join("  "));

    let sep: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep.join("  "));

    for row in &rows {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let w = widths.get(i).copied().unwrap_or(0);
                format!("{:width$}", cell, width = w)
            })
            .collect();
        println!("{}", cells.join("  "));
    }
}

/// Human-readable run report.
pub fn print_report(report: &RunReport) {
    println!("Run:      {}", report.run_id);
    println!("Started:  {}", report.started_at.to_rfc3339());
    println!(
        "Request:  {} {} [{}]",
        report.request.action,
        report.request.expression.mode_name(),
        tagflow_core::types::describe_conditions(report.request.expression.conditions())
    );
    println!("Status:   {}", report.status);
    let trace: Vec<String> = report
        .trace
        .iter()
        .map(|s| format!("{s:?}"))
        .collect();
    println!("Trace:    {}", trace.join(" -> "));
    println!("Elapsed:  {}ms", report.elapsed_ms);

    if let Some(matched) = &report.matched {
        println!("Matched:  {}", matched.count());
    }

    if let Some(dispatch) = &report.dispatch {
        println!();
        let rows = dispatch
            .outcomes
            .iter()
            .map(|o| match &o.outcome {
                Outcome::Applied { previous, current } => vec![
                    o.id.to_string(),
                    "applied".to_string(),
                    format!("{previous} -> {current}"),
                ],
                Outcome::Failed { reason } => {
                    vec![o.id.to_string(), "failed".to_string(), reason.clone()]
                }
            })
            .collect();
        print_table(&["INSTANCE", "RESULT", "DETAIL"], rows);
    }
}
