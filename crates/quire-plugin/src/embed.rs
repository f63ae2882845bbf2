//! `{% embed %}` tags: YouTube players and plain links.

use std::sync::OnceLock;

use regex::{Captures, Regex};

fn paired() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\{%\s*embed\s+url="([^"]+)"\s*%\}([\s\S]*?)\{%\s*endembed\s*%\}"#)
            .expect("valid regex")
    })
}

fn opening() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\{%\s*embed\s+url="([^"]+)"\s*%\}"#).expect("valid regex"))
}

fn closing() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{%\s*endembed").expect("valid regex"))
}

fn youtube() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^.*(youtu.be/|v/|u/\w/|embed/|watch\?v=|&v=)([^#&?]*).*")
            .expect("valid regex")
    })
}

/// Video id of a YouTube URL. Ids are always 11 characters.
pub fn youtube_id(url: &str) -> Option<&str> {
    let id = youtube().captures(url)?.get(2)?.as_str();
    (id.len() == 11).then_some(id)
}

/// HTML for a single embed.
pub fn embed_html(url: &str, caption: &str) -> String {
    if url.is_empty() {
        return r#"<div class="embed-container generic"><p>Missing embed URL</p></div>"#
            .to_string();
    }

    let caption = if caption.is_empty() {
        String::new()
    } else {
        format!(r#"<p class="embed-caption">{}</p>"#, caption)
    };

    match youtube_id(url) {
        Some(id) => format!(
            concat!(
                r#"<div class="embed-container youtube">"#,
                r#"<iframe src="https://www.youtube.com/embed/{}" frameborder="0" allowfullscreen "#,
                r#"allow="accelerometer; autoplay; clipboard-write; encrypted-media; gyroscope; picture-in-picture">"#,
                r#"</iframe>{}</div>"#
            ),
            id, caption
        ),
        None => format!(
            r#"<div class="embed-container generic"><a href="{0}" target="_blank" rel="noopener">{0}</a>{1}</div>"#,
            url, caption
        ),
    }
}

/// Replace every embed tag in `content`.
///
/// Paired tags take their trimmed body as caption. A bare opening tag is
/// only expanded when no `endembed` follows it anywhere later in the page.
pub fn process_embeds(content: &str) -> String {
    let content = paired().replace_all(content, |caps: &Captures| {
        embed_html(&caps[1], caps[2].trim())
    });

    let mut out = String::with_capacity(content.len());
    let mut last = 0;
    for caps in opening().captures_iter(&content) {
        let Some(tag) = caps.get(0) else { continue };
        if closing().is_match(&content[tag.end()..]) {
            continue;
        }
        out.push_str(&content[last..tag.start()]);
        out.push_str(&embed_html(&caps[1], ""));
        last = tag.end();
    }
    out.push_str(&content[last..]);
    out
}
