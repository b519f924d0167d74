//! Ranking prompt construction and token budgeting
//!
//! The provider sees one flat text corpus with explicit document and page
//! markers; the markers are what let it report `source_filename` and a
//! 1-based `page_number` we can resolve back to a concrete cached page.

use std::fmt::Write;

use crate::store::types::Document;

/// Rough token estimate: one token per four characters of text.
const CHARS_PER_TOKEN: usize = 4;

/// Flat cost charged per attached page image.
pub const TOKENS_PER_IMAGE: usize = 258;

/// Fixed overhead for the instruction template around the corpus.
pub const PROMPT_OVERHEAD_TOKENS: usize = 500;

pub fn estimate_text_tokens(text: &str) -> usize {
    text.len() / CHARS_PER_TOKEN
}

/// Render the page corpus with document and page markers.
pub fn corpus_text(documents: &[(Document, Vec<String>)]) -> String {
    let mut out = String::new();
    for (document, pages) in documents {
        let _ = write!(out, "\n=== Document: {} ===\n", document.original_name);
        for (i, text) in pages.iter().enumerate() {
            let _ = write!(
                out,
                "\n--- Page {} of {} ---\n{}",
                i + 1,
                document.original_name,
                text
            );
        }
    }
    out
}

/// Build the full ranking prompt for a query over the corpus.
pub fn build_prompt(query: &str, corpus: &str) -> String {
    format!(
        r#"
You are analyzing exam documents. I have provided the full text content AND images of every page.
Use the images to understand diagrams, graphs, and layout. Use the text to read specific details.

DOCUMENT CONTENT:
{corpus}

TASK:
Find questions related to: "{query}".

CRITICAL QUALITY REQUIREMENTS:

1. **Universal Accuracy Check (The "Asking vs Answering" Rule)**:
   - You must distinguish between a page that **asks** a question and a page that provides space to **answer** it.
   - **INCLUDE** the page ONLY if it contains the **statement of the problem**. Look for:
     - Imperative commands (e.g., "Calculate", "Show that", "Explain", "Find").
     - Core data, equations, or diagrams defining the problem.
   - **EXCLUDE** the page if it is an "Answer Page":
     - Pages that only contain headers like "Question 3 continued" followed by blank lines, empty grids, or ruled space.
     - Pages that only contain working space without defining a new part of the question.

2. **Verify Relevance**: ONLY return pages that actually contain questions matching "{query}".
   - Ignore syllabus lists, table of contents, or headers that mention the topic but are not questions.

3. **Quote Verification (Anti-Hallucination)**:
   - You MUST extract the **exact text** of the question start to prove it exists on this page.
   - The quote MUST come from the **problem definition**, not a header or footer.
   - If you cannot find the exact text to quote, DO NOT return the result.

4. **Accurate Descriptions**: The description MUST precisely match the question content.
   - Include the main topic and specific subtopics.
   - Use the exact question number from the document.
   - Example: "Q4: Differentiation - chain rule"

5. **No Empty Results**: Never return a page if you cannot clearly identify a matching question.

6. **Group Sub-Questions**: Questions with parts (4a, 4b, 4c) should be ONE result.

7. **Source Identification**: You MUST identify which file the page belongs to.
   - Extract the filename from the header "--- Page X of [filename] ---".

Return a JSON list of objects, where each object has:
- "page_number": The page number (1-indexed) where the question appears.
- "source_filename": The name of the file containing this page (e.g., "exam_paper_1.pdf").
- "question_index": The question number or identifier exactly as shown in the document.
- "description": A precise summary including the topic and what the question asks.
- "quote": The exact text snippet from the start of the question to prove it exists.

EXAMPLE GOOD OUTPUT:
[
  {{"page_number": 3, "source_filename": "exam_paper_1.pdf", "question_index": "Q4", "description": "Differentiation - chain rule", "quote": "4. (a) Differentiate y = x^2 sin(x) with respect to x."}},
  {{"page_number": 5, "source_filename": "exam_paper_1.pdf", "question_index": "Q7", "description": "Graph interpretation", "quote": "7. The diagram shows the curve y = f(x). Find the coordinates..."}}
]

IMPORTANT: Only return the JSON array, no markdown formatting or code blocks.
If no relevant questions are found, return an empty array: []
"#
    )
}
