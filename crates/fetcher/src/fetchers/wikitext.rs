//! Caption and title extraction for the Wikipedia picture of the day
//!
//! Every function here is pure and works on text that has already been
//! fetched. The adapter tries them in order and keeps the first hit.

/// What a strategy recovered. At least one field is set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Extracted {
    pub explanation: Option<String>,
    pub title: Option<String>,
}

impl Extracted {
    fn non_empty(self) -> Option<Self> {
        let explanation = self.explanation.filter(|s| !s.is_empty());
        let title = self.title.filter(|s| !s.is_empty());
        if explanation.is_none() && title.is_none() {
            None
        } else {
            Some(Self { explanation, title })
        }
    }
}

/// Parse `Template:POTD/{date}` wikitext for `texttitle`/`title` and `caption`
pub fn from_wikitext(wikitext: &str) -> Option<Extracted> {
    let title = regex!(r"\|\s*texttitle\s*=\s*(.+?)(?:\n|$)")
        .captures(wikitext)
        .map(|c| c[1].to_string())
        .or_else(|| {
            regex!(r"\|\s*title\s*=\s*\[\[([^\]]+)\|([^\]]+)\]\]")
                .captures(wikitext)
                .map(|c| c[2].to_string())
        })
        .or_else(|| {
            regex!(r"\|\s*title\s*=\s*\[\[([^\]]+)\]\]")
                .captures(wikitext)
                .map(|c| c[1].to_string())
        })
        .or_else(|| {
            regex!(r"\|\s*title\s*=\s*([^\[\n|][^\n|]*)")
                .captures(wikitext)
                .map(|c| c[1].to_string())
        })
        .map(|t| clean_wikitext(&t));

    let explanation = regex!(r"(?s)\|\s*caption\s*=\s*(.+?)(?:\n\s*\||$)")
        .captures(wikitext)
        .map(|c| clean_wikitext(&c[1]));

    Extracted { explanation, title }.non_empty()
}

/// Parse the rendered template HTML. The first sentence becomes the title.
pub fn from_html(html: &str) -> Option<Extracted> {
    let block = regex!(r#"(?s)<div style="padding-top: 0\.3em;">(.+?)</div>"#).captures(html)?;

    let text = regex!(r"<[^>]+>").replace_all(&block[1], "");
    let text = regex!(r"(?s)Photograph credit:.*$").replace(&text, "");
    let text = regex!(r"(?s)Archive.*$").replace(&text, "");
    let text = decode_entities(text.trim()).trim().to_string();

    if text.is_empty() {
        return None;
    }

    let title = regex!(r"^([^.]+)")
        .captures(&text)
        .map(|c| c[1].trim().to_string());

    Extracted {
        explanation: Some(text),
        title,
    }
    .non_empty()
}

/// Convert wikitext markup to plain text
pub fn clean_wikitext(text: &str) -> String {
    let text = regex!(r"\[\[([^\]]+)\|([^\]]+)\]\]").replace_all(text, "${2}");
    let text = regex!(r"\[\[([^\]]+)\]\]").replace_all(&text, "${1}");
    let text = regex!(r"'''([^']+)'''").replace_all(&text, "${1}");
    let text = regex!(r"''([^']+)''").replace_all(&text, "${1}");
    let text = decode_entities(&text);
    let text = regex!(r"\s+").replace_all(&text, " ");
    text.trim().to_string()
}

/// Readable title derived from an image filename such as
/// `File:Lake_Louise_2024-01-15_ABC.jpg`
pub fn title_from_filename(filename: &str) -> String {
    let name = filename.strip_prefix("File:").unwrap_or(filename);
    let name = match name.rfind('.') {
        Some(i) if i > 0 => &name[..i],
        _ => name,
    };
    let name = name.replace('_', " ");

    let name = regex!(r",?\s*\d{4}[-_]\d{2}[-_]\d{2}\s*,?").replace_all(&name, " ");
    let name = regex!(r",?\s*\d{8}\s*,?").replace_all(&name, " ");
    let name = regex!(r",?\s+[A-Z]{2,}(\s+[0-9-]+)?\s*$").replace(&name, "");
    let name = regex!(r",?\s+DD\s+\d+-\d+\s*").replace_all(&name, " ");
    let name = regex!(r",?\s+[A-Z]\s+[A-Z]-\w\s*").replace_all(&name, " ");
    let name = regex!(r"^\d+\s+").replace(&name, "");
    let name = regex!(r",?\s+[A-Z]{3}\s*$").replace(&name, "");
    let name = regex!(r",+\s*$").replace(&name, "");
    let name = regex!(r"\s+").replace_all(&name, " ");
    let name = regex!(r",\s*,").replace_all(&name, ",");
    let name = regex!(r"\s*,\s*").replace_all(&name, ", ");

    let name = name.trim().trim_matches(',').trim();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Decode numeric and common named HTML entities. Non-breaking spaces
/// become plain spaces.
pub fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];

        let decoded = tail
            .find(';')
            .filter(|&end| end <= 12)
            .and_then(|end| decode_entity(&tail[1..end]).map(|c| (c, end)));

        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);

    out.replace('\u{a0}', " ")
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code);
    }

    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201c}',
        "rdquo" => '\u{201d}',
        "hellip" => '\u{2026}',
        "deg" => '\u{b0}',
        "copy" => '\u{a9}',
        "reg" => '\u{ae}',
        "times" => '\u{d7}',
        "minus" => '\u{2212}',
        "middot" => '\u{b7}',
        "eacute" => '\u{e9}',
        "egrave" => '\u{e8}',
        "aacute" => '\u{e1}',
        "oacute" => '\u{f3}',
        "uuml" => '\u{fc}',
        "ouml" => '\u{f6}',
        "auml" => '\u{e4}',
        "ccedil" => '\u{e7}',
        "ntilde" => '\u{f1}',
        _ => return None,
    };
    Some(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wikitext_plain_link_title() {
        let extracted = from_wikitext("|title=[[Test Title]]|caption=Test caption").unwrap();
        assert_eq!(extracted.title.as_deref(), Some("Test Title"));
        assert_eq!(extracted.explanation.as_deref(), Some("Test caption"));
        assert!(!extracted.explanation.unwrap().contains("[["));
    }

    #[test]
    fn test_wikitext_piped_link_and_markup() {
        let wikitext = "{{POTD/Layout\n\
             |image=Lion.jpg\n\
             |title=[[Lion|African lion]]\n\
             |caption=The '''[[lion]]''' is a large ''[[Felidae|cat]]'' native to [[Africa]]&nbsp;and&#32;India.\n\
             |credit=Someone\n}}";

        let extracted = from_wikitext(wikitext).unwrap();
        assert_eq!(extracted.title.as_deref(), Some("African lion"));
        assert_eq!(
            extracted.explanation.as_deref(),
            Some("The lion is a large cat native to Africa and India.")
        );
    }

    #[test]
    fn test_wikitext_texttitle_wins() {
        let wikitext = "|texttitle=Aurora borealis\n|title=[[Aurora]]\n|caption=Lights.";
        let extracted = from_wikitext(wikitext).unwrap();
        assert_eq!(extracted.title.as_deref(), Some("Aurora borealis"));
    }

    #[test]
    fn test_wikitext_without_fields() {
        assert_eq!(from_wikitext("{{POTD/Layout|image=x.jpg}}"), None);
    }

    #[test]
    fn test_html_fallback() {
        let html = r#"<table><tr><td><div style="padding-top: 0.3em;"><p>The <a href="/wiki/Moon">Moon</a> rising over a lake. It is full.</p><p>Photograph credit: Jane Doe</p><p>Archive – More featured pictures...</p></div></td></tr></table>"#;

        let extracted = from_html(html).unwrap();
        assert_eq!(extracted.title.as_deref(), Some("The Moon rising over a lake"));
        assert_eq!(
            extracted.explanation.as_deref(),
            Some("The Moon rising over a lake. It is full.")
        );
    }

    #[test]
    fn test_html_without_caption_block() {
        assert_eq!(from_html("<div>nothing here</div>"), None);
    }

    #[test]
    fn test_title_from_filename() {
        assert_eq!(
            title_from_filename("File:Lake_Louise_2024-01-15_ABC.jpg"),
            "Lake Louise"
        );
        assert_eq!(title_from_filename("File:adult_male_lion.jpg"), "Adult male lion");
        assert_eq!(
            title_from_filename("File:01_sunset_over_the_sea_20230704.png"),
            "Sunset over the sea"
        );
        assert_eq!(
            title_from_filename("Eiffel_Tower,_Paris,_France.jpg"),
            "Eiffel Tower, Paris, France"
        );
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &amp; b"), "a & b");
        assert_eq!(decode_entities("&#169; &#x263A;"), "\u{a9} \u{263a}");
        assert_eq!(decode_entities("x&nbsp;y\u{a0}z"), "x y z");
        assert_eq!(decode_entities("AT&T; R&D"), "AT&T; R&D");
        assert_eq!(decode_entities("trailing &"), "trailing &");
    }
}
