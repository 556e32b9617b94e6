use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use crate::error::{Result, TutorError};

pub const STUDY_PLAN: &str = "SC Permit Test - 4 Week Study Plan

Week 1: Foundations
- Day 1: Read the Driver's Manual sections on licensing and the permit restrictions.
- Day 2: Learn sign shapes and colors (octagon, triangle, diamond, pennant, round).
- Day 3: Regulatory signs: stop, yield, speed limit, do not enter, wrong way.
- Day 4: Warning signs: curves, merges, crossings, school zones.
- Day 5: Take a 5-question Road Signs quiz and review every miss.
- Day 6: Flashcards on road signs, 10 minutes morning and evening.
- Day 7: Rest, or re-read any section you found hard.

Week 2: Rules of the Road
- Day 1: Traffic signals, flashing lights and arrows.
- Day 2: Right of way at intersections, four-way stops and roundabouts.
- Day 3: Emergency vehicles, school buses and pedestrians.
- Day 4: Lane use, passing and pavement markings.
- Day 5: Take Right of Way and Traffic Signals quizzes.
- Day 6: Ask the tutor about every question you got wrong.
- Day 7: Flashcards on everything from weeks 1 and 2.

Week 3: Safety and the Law
- Day 1: Speed limits, following distance and stopping distance.
- Day 2: Alcohol and drug laws, implied consent, zero tolerance under 21.
- Day 3: Driving in bad weather, at night and on highways.
- Day 4: Sharing the road with motorcycles, trucks and bicycles.
- Day 5: Take Speed Limits and Alcohol Laws quizzes.
- Day 6: Review your Progress Tracker and pick your weakest topic.
- Day 7: Flashcards on your weakest topic.

Week 4: Test Readiness
- Day 1: 10-question General quiz, timed at one minute per question.
- Day 2: Review misses with the tutor.
- Day 3: 10-question quiz on your weakest topic.
- Day 4: Full flashcard review across all topics.
- Day 5: Two General quizzes back to back. Aim for 80% or better.
- Day 6: Light review only. Re-read sign shapes and right of way rules.
- Day 7: Rest well before test day. Bring your documents.

Tip: short daily sessions beat one long cram session.";

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const TOP: i64 = 800;
const BOTTOM: i64 = 40;
const LEFT: i64 = 40;
const LINE_HEIGHT: i64 = 15;
const FONT_SIZE: i64 = 12;

/// Lines that fit on one page: y runs from `TOP` down to `BOTTOM`.
pub const LINES_PER_PAGE: usize = ((TOP - BOTTOM) / LINE_HEIGHT + 1) as usize;

/// Splits text into pages of at most `LINES_PER_PAGE` lines, one entry per
/// input line. Empty text still yields one (blank) page.
pub fn paginate(text: &str) -> Vec<Vec<&str>> {
    let lines: Vec<&str> = text.split('\n').collect();
    lines
        .chunks(LINES_PER_PAGE)
        .map(|chunk| chunk.to_vec())
        .collect()
}

fn page_content(lines: &[&str]) -> Content {
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), Object::Integer(FONT_SIZE)]),
        Operation::new("TL", vec![Object::Integer(LINE_HEIGHT)]),
        Operation::new("Td", vec![Object::Integer(LEFT), Object::Integer(TOP)]),
    ];
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            operations.push(Operation::new("T*", vec![]));
        }
        operations.push(Operation::new(
            "Tj",
            vec![Object::string_literal(line.trim_end_matches('\r'))],
        ));
    }
    operations.push(Operation::new("ET", vec![]));
    Content { operations }
}

/// Renders `text` as a PDF, one line per input line, Helvetica 12 on A4.
pub fn render_pdf(text: &str) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids = Vec::new();
    for lines in paginate(text) {
        let encoded = page_content(&lines)
            .encode()
            .map_err(|e| TutorError::Render(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(page_count),
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(PAGE_WIDTH),
                Object::Integer(PAGE_HEIGHT),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| TutorError::Render(e.to_string()))?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_holds_fifty_one_lines() {
        assert_eq!(LINES_PER_PAGE, 51);

        let text = vec!["line"; 103].join("\n");
        let pages = paginate(&text);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].len(), 51);
        assert_eq!(pages[1].len(), 51);
        assert_eq!(pages[2].len(), 1);
    }

    #[test]
    fn blank_lines_are_kept() {
        let pages = paginate("a\n\nb");
        assert_eq!(pages, vec![vec!["a", "", "b"]]);
        assert_eq!(paginate("").len(), 1);
    }

    #[test]
    fn study_plan_renders_to_a_pdf() {
        let bytes = render_pdf(STUDY_PLAN).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), paginate(STUDY_PLAN).len());
    }

    #[test]
    fn long_text_spans_several_pages() {
        let text: String = (0..120).map(|i| format!("Line {}\n", i)).collect();
        let doc = Document::load_mem(&render_pdf(&text).unwrap()).unwrap();
        // 121 lines counting the empty one after the final newline
        assert_eq!(doc.get_pages().len(), 3);
    }
}
