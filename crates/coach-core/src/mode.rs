use serde::{Deserialize, Serialize};

/// The fixed set of coaching modes a session can run in. The serde names
/// match the labels stored alongside existing room records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoachingMode {
    #[serde(rename = "Topic Base Lecture")]
    Lecture,
    #[serde(rename = "Open-Ans Prep")]
    OpenAnswerPrep,
    #[serde(rename = "Mockup Interview")]
    MockInterview,
    #[serde(rename = "Learn Language")]
    LanguageLearning,
    #[serde(rename = "Meditation")]
    Meditation,
}

impl CoachingMode {
    pub const ALL: [CoachingMode; 5] = [
        CoachingMode::Lecture,
        CoachingMode::OpenAnswerPrep,
        CoachingMode::MockInterview,
        CoachingMode::LanguageLearning,
        CoachingMode::Meditation,
    ];

    /// The stored/display label for this mode.
    pub fn label(&self) -> &'static str {
        match self {
            CoachingMode::Lecture => "Topic Base Lecture",
            CoachingMode::OpenAnswerPrep => "Open-Ans Prep",
            CoachingMode::MockInterview => "Mockup Interview",
            CoachingMode::LanguageLearning => "Learn Language",
            CoachingMode::Meditation => "Meditation",
        }
    }

    /// Evaluative modes get a performance-feedback summary; the rest get
    /// session notes.
    pub fn is_evaluative(&self) -> bool {
        matches!(
            self,
            CoachingMode::MockInterview | CoachingMode::OpenAnswerPrep
        )
    }

    /// The system directive sent with every completion call, interpolated
    /// with the session topic.
    pub fn system_prompt(&self, topic: &str) -> String {
        let topic = if topic.trim().is_empty() {
            "general knowledge"
        } else {
            topic
        };
        match self {
            CoachingMode::Lecture => format!(
                "You are an experienced and passionate university professor delivering an engaging lecture on {topic}.\n\n\
                 Your teaching style:\n\
                 - Start by introducing the topic with an interesting hook or real-world relevance\n\
                 - Break down complex concepts into digestible parts with clear explanations\n\
                 - Use concrete examples, analogies, and real-world applications to illustrate points\n\
                 - Encourage critical thinking by asking rhetorical questions\n\
                 - Summarize key points at the end of each explanation\n\
                 - Maintain an enthusiastic, approachable tone that keeps students engaged\n\n\
                 Keep responses conversational yet informative (3-5 sentences per turn). \
                 Adapt your language to the student's level of understanding."
            ),
            CoachingMode::OpenAnswerPrep => format!(
                "You are an expert interview and exam preparation coach specializing in open-ended questions about {topic}.\n\n\
                 Your coaching approach:\n\
                 - Ask one thought-provoking, open-ended question at a time related to {topic}\n\
                 - Listen carefully to the student's answer and identify strengths and areas for improvement\n\
                 - Provide specific, constructive feedback on answer structure, clarity, depth of knowledge, and confidence\n\
                 - Offer practical tips to improve their responses\n\
                 - Follow up with increasingly challenging questions to build their skills\n\
                 - Celebrate improvements and encourage continuous learning\n\n\
                 Be supportive yet honest. Your goal is to help them articulate comprehensive, \
                 well-structured answers confidently."
            ),
            CoachingMode::MockInterview => format!(
                "You are a seasoned HR professional and technical interviewer conducting a realistic job interview \
                 for a position related to {topic}.\n\n\
                 Interview guidelines:\n\
                 - Maintain a professional yet friendly demeanor throughout\n\
                 - Mix behavioral, technical, and situational questions, with follow-ups to assess depth\n\
                 - Evaluate responses for relevance, clarity, problem-solving approach, and cultural fit\n\
                 - Provide brief, constructive feedback after each answer\n\
                 - Acknowledge good responses and probe deeper when answers are vague or incomplete\n\n\
                 Keep the pace realistic - 2-3 sentences per response. Make the candidate feel \
                 they're in a real interview setting."
            ),
            CoachingMode::LanguageLearning => format!(
                "You are a patient, encouraging, and highly skilled language teacher for {topic} language.\n\n\
                 Teaching methodology:\n\
                 - Start with the basics: greetings, common phrases, and essential vocabulary\n\
                 - Introduce new concepts progressively, building on what's already learned\n\
                 - Use the target language with English translations: \"[target language] (translation)\"\n\
                 - For pronunciation, provide phonetic guidance: \"[word] (pronounced: wurd)\"\n\
                 - Correct mistakes gently: \"Good try! The correct way is...\"\n\
                 - Provide cultural context when relevant, and celebrate progress enthusiastically\n\
                 - Adapt to the learner's pace - never overwhelm\n\n\
                 Create a safe, fun learning environment where mistakes are welcomed as learning opportunities."
            ),
            CoachingMode::Meditation => format!(
                "You are a certified meditation and mindfulness guide with years of experience helping people \
                 find inner peace. Today's session focuses on {topic}.\n\n\
                 Guidance principles:\n\
                 - Speak in a calm, soothing, gentle tone with slow pacing\n\
                 - Use simple, clear instructions that are easy to follow\n\
                 - Guide breathing exercises: \"Breathe in slowly... hold... release gently...\"\n\
                 - Incorporate peaceful imagery: natural scenes, warm calming light, releasing tension\n\
                 - Encourage present-moment awareness and body scanning\n\
                 - Acknowledge that wandering thoughts are normal\n\n\
                 Your goal is to help them release stress, find calm, and cultivate mindfulness. \
                 Every word should promote relaxation and inner peace."
            ),
        }
    }

    /// The one-shot assistant greeting spoken on session entry, before any
    /// user utterance.
    pub fn greeting(&self, expert: &str, topic: &str) -> String {
        let expert = if expert.trim().is_empty() {
            self.default_expert_title()
        } else {
            expert
        };
        let topic = if topic.trim().is_empty() {
            self.default_topic()
        } else {
            topic
        };
        match self {
            CoachingMode::Lecture => format!(
                "Welcome! I'm {expert} and today's lecture is on {topic}. We'll explore key concepts, \
                 practical applications, and answer any questions you have. Are you ready to begin?"
            ),
            CoachingMode::OpenAnswerPrep => format!(
                "Hello! I'm {expert}. Today we'll practice answering open-ended questions about {topic}. \
                 I'll ask you questions and help you structure clear, comprehensive answers. \
                 Let's start - tell me what you know about this subject."
            ),
            CoachingMode::MockInterview => format!(
                "Good morning! I'm {expert} and I'll be conducting your interview today for a position \
                 related to {topic}. Let's begin - please tell me about yourself and your experience."
            ),
            CoachingMode::LanguageLearning => format!(
                "Hello! I'm {expert}. Welcome to your {topic} learning session! We'll start with basics \
                 and practice together. Let's begin with a simple greeting - try saying hello in the language!"
            ),
            CoachingMode::Meditation => format!(
                "Welcome. I'm {expert}. Find a comfortable position, close your eyes if you wish, and \
                 let's begin our meditation journey together. Take a slow, deep breath in through your \
                 nose... hold for three... and gently release through your mouth."
            ),
        }
    }

    fn default_expert_title(&self) -> &'static str {
        match self {
            CoachingMode::Lecture => "your instructor",
            CoachingMode::OpenAnswerPrep => "your prep coach",
            CoachingMode::MockInterview => "your interviewer",
            CoachingMode::LanguageLearning => "your language teacher",
            CoachingMode::Meditation => "your guide",
        }
    }

    fn default_topic(&self) -> &'static str {
        match self {
            CoachingMode::Lecture => "the subject",
            CoachingMode::OpenAnswerPrep => "various topics",
            CoachingMode::MockInterview => "this field",
            CoachingMode::LanguageLearning => "language",
            // Meditation's greeting never mentions the topic.
            CoachingMode::Meditation => "the subject",
        }
    }

    /// The system directive for post-session summarization. Evaluative modes
    /// produce feedback with a score; the others produce structured notes.
    pub fn summary_prompt(&self, topic: &str) -> String {
        if self.is_evaluative() {
            "You are an expert evaluator providing detailed feedback on the conversation below.\n\n\
             Analyze the user's performance and provide:\n\n\
             **Performance Summary:** overall impression, key strengths, areas needing improvement\n\
             **Detailed Feedback:** communication skills, content quality, structure, technical knowledge\n\
             **Strengths:** 3-4 specific things done well\n\
             **Areas for Improvement:** 3-4 specific areas with actionable suggestions\n\
             **Recommendations:** concrete steps and practice areas\n\
             **Overall Score:** X/10\n\n\
             Be constructive, specific, and encouraging."
                .to_string()
        } else {
            format!(
                "You are an expert note-taker creating comprehensive summary notes.\n\n\
                 Create detailed notes with:\n\n\
                 **Session Overview:** topic covered: {topic}; session type: {}\n\
                 **Key Concepts Covered:** main topics, important definitions, core principles\n\
                 **Detailed Notes:** organized by topic, including examples mentioned\n\
                 **Key Takeaways:** 3-5 most important points and practical applications\n\
                 **Summary:** brief 2-3 sentence overview\n\n\
                 Format in a clear, organized structure with bullet points and headings.",
                self.label()
            )
        }
    }
}

impl std::str::FromStr for CoachingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        let found = Self::ALL.iter().find(|mode| {
            let label = mode.label().to_lowercase();
            label == normalized || label.replace(' ', "-") == normalized
        });
        match found {
            Some(mode) => Ok(*mode),
            None => Err(format!(
                "unknown coaching mode {s:?}; expected one of: {}",
                Self::ALL.map(|m| m.label()).join(", ")
            )),
        }
    }
}

impl std::fmt::Display for CoachingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip_through_serde() {
        for mode in CoachingMode::ALL {
            let json = serde_json::to_string(&mode).unwrap();
            assert_eq!(json, format!("\"{}\"", mode.label()));
            let back: CoachingMode = serde_json::from_str(&json).unwrap();
            assert_eq!(back, mode);
        }
    }

    #[test]
    fn parses_labels_case_insensitively() {
        assert_eq!(
            "mockup interview".parse::<CoachingMode>().unwrap(),
            CoachingMode::MockInterview
        );
        assert_eq!(
            "learn-language".parse::<CoachingMode>().unwrap(),
            CoachingMode::LanguageLearning
        );
        assert!("karaoke".parse::<CoachingMode>().is_err());
    }

    #[test]
    fn system_prompt_interpolates_topic() {
        let prompt = CoachingMode::Lecture.system_prompt("operating systems");
        assert!(prompt.contains("operating systems"));

        let fallback = CoachingMode::Lecture.system_prompt("  ");
        assert!(fallback.contains("general knowledge"));
    }

    #[test]
    fn greeting_names_expert_and_topic() {
        let greeting = CoachingMode::MockInterview.greeting("Matthew", "backend engineering");
        assert!(greeting.contains("Matthew"));
        assert!(greeting.contains("backend engineering"));

        let anonymous = CoachingMode::Meditation.greeting("", "breathing");
        assert!(anonymous.contains("your guide"));
    }

    #[test]
    fn greeting_topic_fallback_varies_by_mode() {
        assert!(CoachingMode::Lecture.greeting("Joanna", "").contains("the subject"));
        assert!(CoachingMode::OpenAnswerPrep
            .greeting("Joanna", " ")
            .contains("various topics"));
        assert!(CoachingMode::MockInterview
            .greeting("Joanna", "")
            .contains("this field"));
        assert!(CoachingMode::LanguageLearning
            .greeting("Joanna", "")
            .contains("your language learning session"));
    }

    #[test]
    fn summary_prompt_depends_on_mode_kind() {
        assert!(CoachingMode::MockInterview.is_evaluative());
        assert!(!CoachingMode::Meditation.is_evaluative());

        let feedback = CoachingMode::OpenAnswerPrep.summary_prompt("databases");
        assert!(feedback.contains("Overall Score"));

        let notes = CoachingMode::Lecture.summary_prompt("databases");
        assert!(notes.contains("Key Takeaways"));
        assert!(notes.contains("databases"));
    }
}
