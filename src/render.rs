//! Gallery page rendering.
//!
//! Media tags in the document are replaced by HTML snippets pointing at the
//! flat outputs, links to copied auxiliary files are rewritten to the flat
//! copies, and the
//! remaining Markdown goes through `pulldown-cmark`. The result is wrapped
//! in a self-contained page with the stylesheet inlined.
//!
//! Uses [maud](https://maud.lambda.xyz/) for compile-time HTML templating.

use crate::classify::GalleryPlan;
use crate::document::{Marker, Token, is_auxiliary_target};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use pulldown_cmark::{Options, Parser, html as md_html};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const CSS: &str = include_str!("../static/gallery.css");

/// Render the page for a scanned document.
///
/// `base` is the document's directory, used to resolve references the same
/// way the reader did. `copied` maps resolved auxiliary files to their flat
/// names. `fallback_title` is used when the document has no top-level
/// heading.
pub fn render_page(
    tokens: &[Token],
    plan: &GalleryPlan,
    copied: &HashMap<PathBuf, String>,
    base: &Path,
    fallback_title: &str,
) -> String {
    let markdown = rewrite_markdown(tokens, plan, copied, base);
    let title = first_heading(&markdown).unwrap_or_else(|| fallback_title.to_string());

    let parser = Parser::new_ext(
        &markdown,
        Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH,
    );
    let mut body_html = String::new();
    md_html::push_html(&mut body_html, parser);

    base_document(&title, html! { main.gallery { (PreEscaped(body_html)) } }).into_string()
}

/// Replace media tokens with HTML and point links to copied auxiliary files
/// at their flat copies. Everything else is passed through verbatim.
pub fn rewrite_markdown(
    tokens: &[Token],
    plan: &GalleryPlan,
    copied: &HashMap<PathBuf, String>,
    base: &Path,
) -> String {
    let mut out = String::new();
    for token in tokens {
        match token {
            Token::Text(text) => out.push_str(text),
            Token::Media {
                marker,
                description,
                path,
            } => {
                let snippet = match plan.entry(&base.join(path), *marker) {
                    Some(entry) => match (&entry.thumb, marker) {
                        (Some(thumb), Marker::Gallery) => html! {
                            a.imglink href=(entry.full) {
                                img src=(thumb) title=(description) alt=(description);
                            }
                        },
                        _ => html! { img.banner src=(entry.full) alt=(description); },
                    },
                    // Excluded during classification: keep the description only.
                    None => html! { (description) },
                };
                out.push_str(&snippet.into_string());
            }
            Token::Link { text, target } if is_auxiliary_target(target) => {
                let Some(flat) = copied.get(&base.join(target.trim())) else {
                    out.push_str(&format!("[{text}]({target})"));
                    continue;
                };
                if flat.contains(' ') {
                    out.push_str(&format!("[{text}](<{flat}>)"));
                } else {
                    out.push_str(&format!("[{text}]({flat})"));
                }
            }
            Token::Link { text, target } => out.push_str(&format!("[{text}]({target})")),
        }
    }
    out
}

/// Text of the first `# ` heading line.
fn first_heading(markdown: &str) -> Option<String> {
    markdown
        .lines()
        .filter_map(|line| line.trim_start().strip_prefix("# "))
        .map(|title| title.trim().trim_end_matches('#').trim().to_string())
        .find(|title| !title.is_empty())
}

fn base_document(title: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                style { (PreEscaped(CSS)) }
            }
            body {
                (content)
                footer { "Built with media-batch" }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::PageEntry;
    use crate::document::scan;
    use std::path::PathBuf;

    fn plan_with(entries: &[(&str, bool, &str, Option<&str>)]) -> GalleryPlan {
        let mut plan = GalleryPlan::default();
        for (source, banner, full, thumb) in entries {
            plan.entries.insert(
                (PathBuf::from(source), *banner),
                PageEntry {
                    full: full.to_string(),
                    thumb: thumb.map(str::to_string),
                },
            );
        }
        plan
    }

    /// Rewrite with no auxiliary files copied.
    fn rewrite(tokens: &[Token], plan: &GalleryPlan) -> String {
        rewrite_markdown(tokens, plan, &HashMap::new(), Path::new("/doc"))
    }

    fn page(tokens: &[Token], plan: &GalleryPlan, fallback_title: &str) -> String {
        render_page(tokens, plan, &HashMap::new(), Path::new("/doc"), fallback_title)
    }

    fn copied(entries: &[(&str, &str)]) -> HashMap<PathBuf, String> {
        entries
            .iter()
            .map(|(source, flat)| (PathBuf::from(source), flat.to_string()))
            .collect()
    }

    #[test]
    fn gallery_entry_becomes_thumbnail_link() {
        let tokens = scan("!![A \"quoted\" dawn](pics/dawn.gif)");
        let plan = plan_with(&[("/doc/pics/dawn.gif", false, "dawn.gif", Some("dawn_thumb.jpg"))]);

        let md = rewrite(&tokens, &plan);

        assert_eq!(
            md,
            "<a class=\"imglink\" href=\"dawn.gif\"><img src=\"dawn_thumb.jpg\" \
             title=\"A &quot;quoted&quot; dawn\" alt=\"A &quot;quoted&quot; dawn\"></a>"
        );
    }

    #[test]
    fn banner_becomes_plain_image() {
        let tokens = scan("!banner[Top](top.png)");
        let plan = plan_with(&[("/doc/top.png", true, "top.png", None)]);
        let md = rewrite(&tokens, &plan);
        assert_eq!(md, "<img class=\"banner\" src=\"top.png\" alt=\"Top\">");
    }

    #[test]
    fn excluded_media_keeps_description() {
        let tokens = scan("see ![<lost>](gone.jpg) here");
        let md = rewrite(&tokens, &GalleryPlan::default());
        assert_eq!(md, "see &lt;lost&gt; here");
    }

    #[test]
    fn auxiliary_links_are_flattened_and_others_kept() {
        let tokens =
            scan("[plan](docs/trip plan.pdf) [map](maps/a.png) [web](https://x.org) [top](#top)");
        let copied = copied(&[
            ("/doc/docs/trip plan.pdf", "trip plan.pdf"),
            ("/doc/maps/a.png", "a.png"),
        ]);
        let md = rewrite_markdown(&tokens, &GalleryPlan::default(), &copied, Path::new("/doc"));
        assert_eq!(
            md,
            "[plan](<trip plan.pdf>) [map](a.png) [web](https://x.org) [top](#top)"
        );
    }

    #[test]
    fn links_to_uncopied_files_keep_their_target() {
        let tokens =
            scan("!![Dawn](photos/dawn.jpg) [full res](photos/dawn.jpg) [prev](old/index.html)");
        let plan = plan_with(&[(
            "/doc/photos/dawn.jpg",
            false,
            "dawn.jpg",
            Some("dawn_thumb.jpg"),
        )]);
        let md = rewrite(&tokens, &plan);
        assert!(
            md.ends_with(" [full res](photos/dawn.jpg) [prev](old/index.html)"),
            "{md}"
        );
    }

    #[test]
    fn page_title_from_first_heading() {
        let tokens = scan("intro\n\n# Summer 2024 #\n\n## Day one\n");
        let html = page(&tokens, &GalleryPlan::default(), "pkg");
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("<title>Summer 2024</title>"));
        assert!(html.contains("<h2>Day one</h2>"));
    }

    #[test]
    fn page_title_falls_back_to_package_name() {
        let tokens = scan("no headings here");
        let html = page(&tokens, &GalleryPlan::default(), "holiday");
        assert!(html.contains("<title>holiday</title>"));
        assert!(html.contains("a.imglink"));
    }

    #[test]
    fn snippets_survive_markdown_conversion() {
        let tokens = scan("Look:\n\n!![Dawn](dawn.jpg) !![Dusk](dusk.jpg)\n");
        let plan = plan_with(&[
            ("/doc/dawn.jpg", false, "dawn.jpg", Some("dawn_thumb.jpg")),
            ("/doc/dusk.jpg", false, "dusk.jpg", Some("dusk_thumb.jpg")),
        ]);
        let html = page(&tokens, &plan, "pkg");
        assert!(html.contains("<a class=\"imglink\" href=\"dawn.jpg\">"));
        assert!(html.contains("src=\"dusk_thumb.jpg\""));
    }
}
