//! List command implementation.
//!
//! Thin wrapper over the core listing service: the caller's role and id come
//! from the context, filters from the flags.

use anyhow::Result;
use qatrack_core::list;

use crate::cli::{Context, ListArgs};
use crate::format::{self, ListingPage, format_entity_line, format_page_footer};

/// Execute the list command.
///
/// # Errors
///
/// Returns `Validation` for a bad window or date range, or
/// `StoreUnavailable` if the store cannot be read.
pub fn execute(ctx: &Context, args: &ListArgs) -> Result<()> {
    let limit = args
        .limit
        .unwrap_or_else(|| i64::try_from(ctx.config.default_page_size).unwrap_or(i64::MAX));
    let request = ctx.request(&args.filters).page(args.skip, limit);

    let store = ctx.open_store()?;
    let page = list(&store, args.kind, &request, &ctx.limits())?;
    tracing::debug!(kind = %args.kind, total = page.total, shown = page.items.len(), "Listed entities");

    if ctx.json {
        format::print_json(&ListingPage {
            items: page.items,
            total: page.total,
            skip: request.skip,
            limit: request.limit,
        })?;
    } else if page.items.is_empty() {
        println!("No {} found.", args.kind.label());
        if page.total > 0 {
            println!("{}", format_page_footer(request.skip, 0, page.total));
        }
    } else {
        for listed in &page.items {
            println!("{}", format_entity_line(listed));
        }
        println!("\n{}", format_page_footer(request.skip, page.items.len(), page.total));
    }

    Ok(())
}
