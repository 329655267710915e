/// Reply the extraction model is told to give for blank or illegible documents.
pub const EMPTY_OR_UNREADABLE_MARKER: &str = "[[EMPTY_OR_UNREADABLE_DOCUMENT]]";

pub const EXTRACTION_PROMPT: &str = "\
You are an expert document analysis AI. Your task is to extract all text content from the provided document.
Preserve the original formatting as much as possible, including:
- Paragraphs and line breaks
- Headings (if discernible, represent them clearly)
- Lists (bulleted or numbered, preserve markers)
- Tables (represent as formatted text)

Output only the extracted text. Do not add any commentary.
If the document appears to be empty or unreadable, respond with \"[[EMPTY_OR_UNREADABLE_DOCUMENT]]\".";
