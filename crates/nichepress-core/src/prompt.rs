//! Instruction text sent to the language model.

use std::fmt::Write;

use crate::models::{ComparisonProduct, InternalLink, ScrapedProduct};

/// Competitor text beyond this many characters is cut before prompting.
pub const COMPETITOR_TEXT_LIMIT: usize = 3000;

/// Everything the article prompt can embed. Only `product` is required.
#[derive(Debug, Clone)]
pub struct ArticleRequest<'a> {
    pub product: &'a ScrapedProduct,
    pub comparisons: &'a [ComparisonProduct],
    pub internal_links: &'a [InternalLink],
    pub language: &'a str,
    pub competitor_text: Option<&'a str>,
    pub video_embed: Option<&'a str>,
}

impl<'a> ArticleRequest<'a> {
    pub fn new(product: &'a ScrapedProduct) -> Self {
        Self {
            product,
            comparisons: &[],
            internal_links: &[],
            language: "English",
            competitor_text: None,
            video_embed: None,
        }
    }

    pub fn with_comparisons(mut self, comparisons: &'a [ComparisonProduct]) -> Self {
        self.comparisons = comparisons;
        self
    }

    pub fn with_internal_links(mut self, links: &'a [InternalLink]) -> Self {
        self.internal_links = links;
        self
    }

    pub fn with_language(mut self, language: &'a str) -> Self {
        self.language = language;
        self
    }

    pub fn with_competitor_text(mut self, text: Option<&'a str>) -> Self {
        self.competitor_text = text;
        self
    }

    pub fn with_video_embed(mut self, embed: Option<&'a str>) -> Self {
        self.video_embed = embed;
        self
    }
}

/// Identity and style rules for the reviewer persona.
pub fn system_instruction(language: &str) -> String {
    format!(
        "You are an expert product tester and consumer advocate. Write reviews that read as \
         honest, personal and human.\n\
         \n\
         LANGUAGE: write the ENTIRE article in {language}. Headings, paragraphs and lists must \
         all be in {language}; only the product name may stay untranslated.\n\
         \n\
         NEVER use these words: unleash, unlock, realm, landscape, tapestry, symphony, \
         game-changer, delve, dive deep, bustling, vibrant, meticulous, paramount, elevate.\n\
         \n\
         TONE: conversational (use I, we, you), direct, no filler. Mix short sentences with \
         longer ones. Write from hands-on experience (\"In my testing...\")."
    )
}

/// The user prompt for a full review article.
pub fn article_prompt(req: &ArticleRequest<'_>) -> String {
    let p = req.product;
    let title = or_default(&p.title, "Unknown Product");
    let price = or_default(&p.price, "N/A");
    let rating = or_default(&p.rating, "N/A");
    let review_count = or_default(&p.review_count, "0");
    let product_link = or_default(&p.product_url, "#");

    let mut out = String::new();
    let _ = writeln!(
        out,
        "Write a complete, HTML-formatted product review for: **{title}** in **{}**.\n",
        req.language
    );

    if let Some(text) = req.competitor_text.filter(|t| !t.trim().is_empty()) {
        let _ = writeln!(
            out,
            "### Competitor reference (do not copy)\n\
             A top-ranking article on this topic says:\n{}... (truncated)\n\n\
             Write something deeper, more helpful and better structured. Cover the points it \
             misses. Use it only as the benchmark to beat.\n",
            truncate_chars(text, COMPETITOR_TEXT_LIMIT)
        );
    }

    let _ = writeln!(
        out,
        "**Product info:**\n- Price: {price} | Rating: {rating} stars ({review_count} reviews)\n"
    );

    if !req.comparisons.is_empty() {
        out.push_str("### Comparison data\n");
        for c in req.comparisons {
            let _ = writeln!(
                out,
                "- Compare with: {} | Price: {} | Rating: {}",
                c.title, c.price, c.rating
            );
        }
        out.push('\n');
    }

    if !req.internal_links.is_empty() {
        out.push_str("### Internal links (link to these naturally where relevant)\n");
        for l in req.internal_links {
            let _ = writeln!(out, "- Link title: '{}' -> URL: {}", l.title, l.link);
        }
        out.push('\n');
    }

    out.push_str("### Output structure (HTML body only)\n\n");

    if let Some(embed) = req.video_embed.filter(|e| !e.trim().is_empty()) {
        let _ = writeln!(
            out,
            "VIDEO: insert the following HTML block unchanged, right before the final \
             conclusion section:\n\n{embed}\n"
        );
    }

    let _ = write!(
        out,
        "1. Quick verdict: start with <h2>Quick Verdict</h2>, a bold yes/no recommendation \
         and a 40-50 word answer to \"is it worth buying?\".\n\
         2. <h2>Key Takeaways</h2>: 3-4 bullet points.\n\
         3. Introduction: a personal hook; who needs this product and why.\n\
         4. Build & design: <h2>/<h3> sections on quality and feel.\n\
         5. Performance / in-depth testing of specific features.\n\
         6. Comparison: a responsive HTML table, only if comparison data was given.\n\
         7. Pros & cons: a styled HTML table (green for pros, red for cons).\n\
         8. <h2>FAQ</h2>: 3 common questions with short answers.\n\
         9. Final conclusion: exactly who should buy this.\n\n\
         CTA: use this exact product link: {product_link}\n\
         Insert a \"Check Price on Amazon\" button after the introduction and at the very end.\n\n\
         FORMAT: raw HTML body only, no ```html fences. Use <h2>, <h3>, <p>, <ul>, <li>, \
         <strong>.\n\n\
         10. Social media bundle: at the VERY END, after the HTML, add one valid JSON block:\n\
         ```json\n\
         {{\n  \"tweet\": \"catchy tweet, max 280 chars, with hashtags\",\n  \
         \"pinterest_title\": \"catchy pin title\",\n  \
         \"pinterest_desc\": \"SEO description for Pinterest, about 100 words\",\n  \
         \"linkedin\": \"professional but engaging summary\"\n}}\n\
         ```\n"
    );

    out
}

/// Prompt asking for target keywords behind a competitor's headings.
pub fn keyword_spy_prompt(headings: &[String]) -> String {
    format!(
        "Analyze these article headings from a competitor's website:\n\n{}\n\n\
         TASK: identify the target SEO keywords (buying intent) they are optimizing for.\n\
         Return a valid JSON list of 5-10 strings, e.g. [\"best gaming laptop\", \
         \"cheap laptop for students\"].\n\nJSON ONLY:",
        headings.join("\n")
    )
}

/// Responsive iframe block for a YouTube review video.
pub fn video_embed(video_id: &str, title: &str) -> String {
    format!(
        r#"<div class="video-wrapper" style="margin: 30px 0; border-radius: 12px; overflow: hidden;">
  <h3 style="margin-bottom: 15px;">Watch: {title}</h3>
  <div style="position: relative; padding-bottom: 56.25%; height: 0; overflow: hidden;">
    <iframe style="position: absolute; top: 0; left: 0; width: 100%; height: 100%; border: 0;"
      src="https://www.youtube.com/embed/{video_id}" title="{title}"
      allow="accelerometer; autoplay; clipboard-write; encrypted-media; gyroscope; picture-in-picture"
      allowfullscreen></iframe>
  </div>
</div>"#
    )
}

/// Cut `text` to at most `max` characters on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.trim().is_empty() {
        default
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product() -> ScrapedProduct {
        ScrapedProduct {
            asin: "B0TEST0001".into(),
            title: "Retro Stick 4K".into(),
            price: "$39.99".into(),
            rating: "4.3 out of 5 stars".into(),
            review_count: "812 ratings".into(),
            image_url: None,
            product_url: "https://www.amazon.com/dp/B0TEST0001".into(),
        }
    }

    #[test]
    fn minimal_prompt_has_product_fields_and_no_optional_sections() {
        let p = product();
        let prompt = article_prompt(&ArticleRequest::new(&p));
        assert!(prompt.contains("Retro Stick 4K"));
        assert!(prompt.contains("$39.99"));
        assert!(prompt.contains("https://www.amazon.com/dp/B0TEST0001"));
        assert!(!prompt.contains("Comparison data"));
        assert!(!prompt.contains("Internal links"));
        assert!(!prompt.contains("Competitor reference"));
        assert!(!prompt.contains("VIDEO:"));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let p = ScrapedProduct {
            title: String::new(),
            price: " ".into(),
            rating: String::new(),
            review_count: String::new(),
            product_url: String::new(),
            ..product()
        };
        let prompt = article_prompt(&ArticleRequest::new(&p));
        assert!(prompt.contains("**Unknown Product**"));
        assert!(prompt.contains("Price: N/A | Rating: N/A stars (0 reviews)"));
        assert!(prompt.contains("exact product link: #"));
    }

    #[test]
    fn optional_context_is_embedded() {
        let p = product();
        let comparisons = vec![ComparisonProduct {
            title: "Other Stick".into(),
            price: "$25".into(),
            rating: "4.0".into(),
        }];
        let links = vec![InternalLink {
            title: "Best handhelds".into(),
            link: "https://blog.example/best".into(),
        }];
        let competitor = "x".repeat(COMPETITOR_TEXT_LIMIT + 500);
        let embed = video_embed("dQw4w9WgXcQ", "Retro Stick 4K Review");

        let req = ArticleRequest::new(&p)
            .with_comparisons(&comparisons)
            .with_internal_links(&links)
            .with_language("Spanish")
            .with_competitor_text(Some(&competitor))
            .with_video_embed(Some(&embed));
        let prompt = article_prompt(&req);

        assert!(prompt.contains("in **Spanish**"));
        assert!(prompt.contains("Compare with: Other Stick | Price: $25"));
        assert!(prompt.contains("'Best handhelds' -> URL: https://blog.example/best"));
        assert!(prompt.contains(&"x".repeat(COMPETITOR_TEXT_LIMIT)));
        assert!(!prompt.contains(&"x".repeat(COMPETITOR_TEXT_LIMIT + 1)));
        assert!(prompt.contains("youtube.com/embed/dQw4w9WgXcQ"));
    }

    #[test]
    fn system_instruction_names_language() {
        assert!(system_instruction("German").contains("ENTIRE article in German"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }

    #[test]
    fn keyword_spy_prompt_lists_headings() {
        let prompt = keyword_spy_prompt(&["Best budget consoles".into(), "Battery life".into()]);
        assert!(prompt.contains("Best budget consoles\nBattery life"));
        assert!(prompt.ends_with("JSON ONLY:"));
    }
}
