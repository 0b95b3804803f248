//! Prompt construction for the two inference operations.
//!
//! Prompts are product copy; keep them here so the client stays mechanical.

/// Structured review of a sales-call transcript.
pub fn transcript_review(transcript_text: &str) -> String {
    format!(
        "Review the following meeting transcript and respond using exactly \
         these sections:\n\n\
         **What You Did Well:**\n\
         - concrete moments that worked, and why\n\n\
         **Areas for Improvement:**\n\
         - specific, actionable recommendations\n\n\
         **Things to Test Next Time:**\n\
         - experiments for the next conversation\n\n\
         Transcript:\n{transcript_text}"
    )
}

/// Icebreaker analysis from a LinkedIn bio and pitch-deck content.
pub fn icebreaker(linkedin_bio: &str, pitch_deck: &str) -> String {
    format!(
        "You are preparing a seller for outreach. Using the LinkedIn bio and \
         pitch deck below, produce a well-structured analysis covering:\n\
         1. Company LinkedIn page and website, if identifiable from the bio\n\
         2. Buying signals, each with a short explanation\n\
         3. Discovery triggers and smart questions to ask\n\
         4. The prospect's likely buying style\n\
         5. The five deck highlights most relevant to this person\n\
         6. Where the deck may miss for them\n\
         7. A short summary\n\
         8. Three reflection questions for meeting prep\n\
         9. A cold-outreach icebreaker of two to three sentences\n\n\
         LinkedIn bio:\n{linkedin_bio}\n\n\
         Pitch deck content:\n{pitch_deck}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompts_embed_their_inputs() {
        let p = transcript_review("UNIQUE-TRANSCRIPT-TOKEN");
        assert!(p.contains("UNIQUE-TRANSCRIPT-TOKEN"));

        let p = icebreaker("BIO-TOKEN", "DECK-TOKEN");
        assert!(p.contains("BIO-TOKEN"));
        assert!(p.contains("DECK-TOKEN"));
    }
}
