use std::env;
use warscroll_stats::{classify_page, ClassifierConfig, PdfDocument};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: debug_pages <pdf_path> [max_page | min-max] [--rows]");
        std::process::exit(1);
    }

    let show_rows = args.iter().any(|a| a == "--rows");
    let range = args
        .iter()
        .skip(2)
        .find(|a| !a.starts_with("--"))
        .map(|s| s.as_str())
        .unwrap_or("1-3");
    let (min_page, max_page): (usize, usize) = if let Some((a, b)) = range.split_once('-') {
        (a.parse().unwrap_or(1), b.parse().unwrap_or(3))
    } else {
        (1, range.parse().unwrap_or(3))
    };
    let min_page = min_page.max(1);

    let doc = match PdfDocument::open(&args[1]) {
        Ok(doc) => doc,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let config = ClassifierConfig::default();

    let selected = doc
        .pages()
        .skip(min_page - 1)
        .take(max_page.saturating_add(1).saturating_sub(min_page));
    for page in selected {
        let page = match page {
            Ok(page) => page,
            Err(e) => {
                eprintln!("Error: {}", e);
                continue;
            }
        };

        let classification = classify_page(&page, &config);
        println!(
            "=== PAGE {} ({} items) {} {:?} ===",
            page.index,
            page.items.len(),
            classification.page_type,
            classification.evidence
        );
        if show_rows {
            for row in page.rows() {
                println!("  y={:7.1} {:?}", row.y, row.text());
            }
        } else {
            for item in &page.items {
                println!(
                    "  x={:7.1} y={:7.1} w={:7.1} fs={:5.1} text={:?}",
                    item.x, item.y, item.width, item.font_size, item.text
                );
            }
        }
        println!();
    }
}
