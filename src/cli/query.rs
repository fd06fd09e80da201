//! Query commands - print views of a loaded graph

use anyhow::{Context, Result};
use console::style;
use heapscope::graph::human_bytes;
use heapscope::{GraphManager, MemObject};

/// Most entries listed per section in `show`
const LIST_LIMIT: usize = 50;

pub fn summary(graph: &GraphManager) {
    print!("{}", graph.summarize());
}

pub fn show(graph: &GraphManager, address: u64, json: bool) -> Result<()> {
    let obj = lookup(graph, address)?;
    if json {
        println!("{}", graph.to_record_json(obj).context("Failed to encode object")?);
        return Ok(());
    }

    println!("{}", style(graph.display(obj)).bold());
    println!("\n{} ({})", style("References").bold(), obj.num_refs());
    print_addresses(graph, obj.ref_list());

    let referrers = obj.referrers().unwrap_or_default();
    println!("\n{} ({})", style("Referrers").bold(), referrers.len());
    print_addresses(graph, referrers);

    if let Some(extra) = obj.unknown_fields() {
        println!("\n{}", style("Other fields").bold());
        for (key, value) in extra {
            println!("  {}: {}", style(key).cyan(), value);
        }
    }
    Ok(())
}

pub fn referrers(graph: &GraphManager, address: u64) -> Result<()> {
    let obj = lookup(graph, address)?;
    let referrers = obj.referrers().unwrap_or_default();
    println!(
        "\n{} Referrers of {} ({})\n",
        style("📊").bold(),
        graph.display(obj),
        referrers.len()
    );
    for &addr in referrers {
        if let Some(referrer) = graph.get(addr) {
            println!("  {}", graph.display(referrer));
        }
    }
    Ok(())
}

pub fn top(graph: &GraphManager, type_str: Option<&str>, count: usize) {
    let mut ranked: Vec<&MemObject> = match type_str {
        Some(t) => graph.objects_of_type(t),
        None => graph.iter().collect(),
    };
    ranked.sort_by(|a, b| {
        b.total_size()
            .cmp(&a.total_size())
            .then(a.address().cmp(&b.address()))
    });

    println!(
        "\n{} Largest total size{}\n",
        style("📊").bold(),
        type_str.map(|t| format!(" ({})", t)).unwrap_or_default()
    );
    for (rank, obj) in ranked.iter().take(count).enumerate() {
        println!(
            "  {:>3}. {:>10}  {}",
            rank + 1,
            style(human_bytes(obj.total_size().unwrap_or(0))).cyan(),
            graph.display(obj)
        );
    }
    if ranked.is_empty() {
        println!("  (no objects)");
    }
}

fn lookup(graph: &GraphManager, address: u64) -> Result<&MemObject> {
    graph
        .get(address)
        .with_context(|| format!("No object at address {} (0x{:x})", address, address))
}

fn print_addresses(graph: &GraphManager, addrs: &[u64]) {
    for &addr in addrs.iter().take(LIST_LIMIT) {
        match graph.get(addr) {
            Some(target) => println!("  {}", graph.display(target)),
            None => println!("  {} {}", addr, style("(not in dump)").dim()),
        }
    }
    if addrs.len() > LIST_LIMIT {
        println!("  ... and {} more", addrs.len() - LIST_LIMIT);
    }
}
