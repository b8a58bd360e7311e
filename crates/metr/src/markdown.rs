use pulldown_cmark::{html, Options, Parser};

/// Render a Markdown document to HTML with GitHub-style extensions
///
/// Always called on the whole document: partial Markdown (an open list, an
/// emphasis run split mid-stream) only renders correctly when reparsed in full.
pub fn render_markdown(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(markdown, options);
    let mut output = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut output, parser);
    output
}
