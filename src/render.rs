use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::cli::RenderArgs;
use crate::formats::{self, AssetRecord, RowRecord};

pub fn run(args: RenderArgs) -> anyhow::Result<()> {
    let rows = formats::read_row_records(Path::new(&args.rows))?;
    let assets = formats::read_asset_records(Path::new(&args.assets))?
        .into_iter()
        .map(|record| (record.url.clone(), record))
        .collect::<HashMap<_, _>>();

    let html = render_catalog(&args.title, &args.image_base, &rows, &assets);

    let out_path = PathBuf::from(&args.out);
    if let Some(parent) = out_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create catalog output dir: {}", parent.display()))?;
    }

    // The catalog replaces whatever a previous run left at this path.
    std::fs::write(&out_path, html)
        .with_context(|| format!("write catalog: {}", out_path.display()))?;
    tracing::info!(out = %out_path.display(), "catalog written");

    Ok(())
}

/// One entry per row with at least one resolved image, in source order. Rows
/// with no resolved image are omitted (fixed policy). The entry shows the
/// first of the row's image URLs that resolved.
pub fn render_catalog(
    title: &str,
    image_base: &str,
    rows: &[RowRecord],
    assets: &HashMap<String, AssetRecord>,
) -> String {
    let image_base = image_base.trim_end_matches('/');

    let mut out = String::new();
    push_header(&mut out, title);

    for row in rows {
        let Some(asset) = row
            .image_urls
            .iter()
            .find_map(|url| assets.get(url.as_str()))
        else {
            tracing::debug!(row = %row.row_id, "row has no resolved image; omitted");
            continue;
        };

        let display = DisplayFields::from_fields(&row.fields);
        let image_src = format!("{image_base}/{}", asset.file_name);
        push_card(&mut out, &image_src, &display);
    }

    push_footer(&mut out);
    out
}

#[derive(Debug, Default, PartialEq)]
struct DisplayFields {
    title: String,
    inventory: Option<String>,
    series: Option<String>,
    year: Option<String>,
    edition: Option<String>,
}

impl DisplayFields {
    /// Field names differ between bases, so extraction matches on key
    /// fragments: title/name, inventory/inv, collection/series, year/date
    /// (keeping the leading year of a dash-separated date), edition
    /// (excluding description keys). Unknown fields are ignored.
    fn from_fields(fields: &serde_json::Map<String, serde_json::Value>) -> Self {
        let mut display = Self::default();

        for (key, value) in fields {
            let Some(text) = value_text(value) else {
                continue;
            };
            let key = key.to_ascii_lowercase();

            if display.title.is_empty() && (key.contains("title") || key.contains("name")) {
                display.title = text;
            } else if display.inventory.is_none()
                && (key.contains("inventory") || key.contains("inv"))
            {
                display.inventory = Some(text);
            } else if display.series.is_none()
                && (key.contains("collection") || key.contains("series"))
            {
                display.series = Some(text);
            } else if display.year.is_none() && (key.contains("year") || key.contains("date")) {
                display.year = Some(leading_year(&text));
            } else if display.edition.is_none()
                && key.contains("edition")
                && !key.contains("desc")
            {
                display.edition = Some(text);
            }
        }

        if display.title.is_empty() {
            display.title = "Untitled".to_owned();
        }
        display
    }
}

fn value_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(text) => {
            let text = text.trim();
            if text.is_empty() {
                None
            } else {
                Some(text.to_owned())
            }
        }
        serde_json::Value::Number(number) => Some(number.to_string()),
        serde_json::Value::Array(items) => {
            let parts = items.iter().filter_map(value_text).collect::<Vec<_>>();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        serde_json::Value::Bool(_) | serde_json::Value::Null | serde_json::Value::Object(_) => None,
    }
}

fn leading_year(text: &str) -> String {
    text.split('-').next().unwrap_or(text).trim().to_owned()
}

fn push_header(out: &mut String, title: &str) {
    out.push_str("<!DOCTYPE html>\n");
    out.push_str("<html lang=\"en\">\n");
    out.push_str("<head>\n");
    out.push_str("    <meta charset=\"UTF-8\">\n");
    out.push_str(
        "    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n",
    );
    out.push_str(&format!("    <title>{}</title>\n", html_escape(title)));
    out.push_str("    <style>\n");
    out.push_str(catalog_css());
    out.push_str("    </style>\n");
    out.push_str("</head>\n");
    out.push_str("<body>\n");
    out.push_str("    <div class=\"container\">\n");
    out.push_str(&format!("        <h1>{}</h1>\n", html_escape(title)));
    out.push_str("        <div class=\"grid\">\n");
}

fn push_card(out: &mut String, image_src: &str, display: &DisplayFields) {
    out.push_str("            <div class=\"artwork-card\">\n");
    out.push_str("                <div class=\"artwork-image\">\n");
    out.push_str(&format!(
        "                    <img src=\"{}\" alt=\"{}\">\n",
        html_escape(image_src),
        html_escape(&display.title)
    ));
    out.push_str("                </div>\n");
    out.push_str("                <div class=\"artwork-info\">\n");
    out.push_str(&format!(
        "                    <div class=\"artwork-title\">{}</div>\n",
        html_escape(&display.title)
    ));
    out.push_str("                    <div class=\"artwork-meta\">\n");
    if let Some(inventory) = &display.inventory {
        out.push_str(&format!(
            "                        <div class=\"inv-number\">{}</div>\n",
            html_escape(inventory)
        ));
    }
    if let Some(series) = &display.series {
        out.push_str(&format!(
            "                        <div><strong>Series:</strong> {}</div>\n",
            html_escape(series)
        ));
    }
    if let Some(year) = &display.year {
        out.push_str(&format!(
            "                        <div><strong>Year:</strong> {}</div>\n",
            html_escape(year)
        ));
    }
    if let Some(edition) = &display.edition {
        out.push_str(&format!(
            "                        <div><strong>Edition:</strong> {}</div>\n",
            html_escape(edition)
        ));
    }
    out.push_str("                    </div>\n");
    out.push_str("                </div>\n");
    out.push_str("            </div>\n");
}

fn push_footer(out: &mut String) {
    out.push_str("        </div>\n");
    out.push_str("    </div>\n");
    out.push_str("</body>\n");
    out.push_str("</html>\n");
}

fn catalog_css() -> &'static str {
    r#"        * {
            margin: 0;
            padding: 0;
            box-sizing: border-box;
        }

        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif;
            background: #fff;
            padding: 20px;
        }

        .container {
            max-width: 1400px;
            margin: 0 auto;
        }

        h1 {
            font-size: 2rem;
            margin-bottom: 30px;
            font-weight: 300;
            text-align: center;
        }

        .grid {
            display: grid;
            grid-template-columns: repeat(auto-fill, minmax(300px, 1fr));
            gap: 30px;
        }

        .artwork-card {
            background: #f9f9f9;
            border-radius: 2px;
            overflow: hidden;
            box-shadow: 0 1px 3px rgba(0,0,0,0.1);
            transition: box-shadow 0.2s;
        }

        .artwork-card:hover {
            box-shadow: 0 4px 12px rgba(0,0,0,0.15);
        }

        .artwork-image {
            width: 100%;
            height: 300px;
            background: #f9f9f9;
            display: flex;
            align-items: center;
            justify-content: center;
            padding: 20px;
        }

        .artwork-image img {
            max-width: 100%;
            max-height: 300px;
            width: auto;
            height: auto;
            object-fit: contain;
            display: block;
        }

        .artwork-info {
            padding: 20px;
        }

        .artwork-title {
            font-size: 1.1rem;
            font-weight: 600;
            margin-bottom: 8px;
            color: #222;
        }

        .artwork-meta {
            font-size: 0.9rem;
            color: #666;
            line-height: 1.6;
        }

        .artwork-meta div {
            margin-bottom: 4px;
        }

        .inv-number {
            font-family: monospace;
            color: #999;
            font-size: 0.85rem;
            margin-bottom: 8px;
        }
"#
}

fn html_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
