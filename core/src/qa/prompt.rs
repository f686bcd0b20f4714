//! Localized prompts and user-facing answer templates.

use super::Question;

/// Answer language. Anything that is not Russian or English is answered in Kyrgyz.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptLanguage {
    Ky,
    Ru,
    En,
}

impl PromptLanguage {
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_lowercase().as_str() {
            "ru" => PromptLanguage::Ru,
            "en" => PromptLanguage::En,
            _ => PromptLanguage::Ky,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            PromptLanguage::Ky => "ky",
            PromptLanguage::Ru => "ru",
            PromptLanguage::En => "en",
        }
    }

    fn persona(self) -> &'static str {
        match self {
            PromptLanguage::Ru => concat!(
                "Вы эксперт-ассистент.\n",
                "Отвечайте на русском языке чётко, понятно и кратко (обычно 1–4 предложения).\n\n",
                "Проверенные факты (используйте как опорные):\n",
                "- Действующая Конституция Кыргызской Республики вступила в силу 5 мая 2021 года.\n\n",
                "Если дан дополнительный контекст, используйте его как вспомогательный источник.\n",
                "Никогда не упоминайте «презентацию», «слайды», «в презентации нет/не указано» ",
                "и не оправдывайтесь отсутствием информации.\n",
            ),
            PromptLanguage::Ky => concat!(
                "Сиз эксперт-ассистентсиз.\n",
                "Суроолорго кыргыз тилинде так, түшүнүктүү жана кыска жооп бериңиз (адатта 1–4 сүйлөм).\n\n",
                "Текшерилген фактылар (таянуу үчүн):\n",
                "- Кыргыз Республикасынын Конституциясынын азыркы редакциясы 2021-жылдын 5-майында күчүнө кирген.\n\n",
                "Эгер кошумча контекст берилсе, аны жардамчы булак катары колдонуңуз.\n",
                "Эч качан «презентация», «слайд» же «презентацияда маалымат жок/көрсөтүлгөн эмес» ",
                "деген сөздөрдү айтпаңыз.\n",
            ),
            PromptLanguage::En => concat!(
                "You are an expert assistant.\n",
                "Answer in English clearly, plainly and briefly (usually 1-4 sentences).\n\n",
                "Verified facts (treat as ground truth):\n",
                "- The current Constitution of the Kyrgyz Republic entered into force on 5 May 2021.\n\n",
                "If additional context is given, use it as a supporting source.\n",
                "Never mention a \"presentation\" or \"slides\", and never excuse yourself ",
                "by missing information.\n",
            ),
        }
    }

    fn thin_context_rule(self, allow_general: bool) -> &'static str {
        match (self, allow_general) {
            (PromptLanguage::Ru, true) => "Если контекст недостаточен, всё равно отвечайте по сути, опираясь на общие знания. Если уверенности нет, прямо скажите, что не уверены, и кратко уточните.",
            (PromptLanguage::Ru, false) => "Если контекст недостаточен, скажите, что данных недостаточно, и задайте 1 уточняющий вопрос.",
            (PromptLanguage::Ky, true) => "Эгер контекст жетишсиз болсо да, жалпы билимге таянып түз жооп бериңиз. Эгер ишеним жок болсо, кыскача ишенбестигиңизди айтыңыз жана тактоо үчүн 1 суроо бериңиз.",
            (PromptLanguage::Ky, false) => "Эгер контекст жетишсиз болсо, маалымат жетишсиз экенин айтыңыз жана 1 тактоочу суроо бериңиз.",
            (PromptLanguage::En, true) => "If the context is insufficient, still answer to the point from general knowledge. If unsure, say so and briefly ask for clarification.",
            (PromptLanguage::En, false) => "If the context is insufficient, say that there is not enough information and ask 1 clarifying question.",
        }
    }

    /// Apology shown when the provider call failed
    pub fn apology(self, detail: &str) -> String {
        match self {
            PromptLanguage::Ru => format!("Произошла ошибка при получении ответа: {detail}"),
            PromptLanguage::Ky => format!("Жообун алууда катачылык болду: {detail}"),
            PromptLanguage::En => format!("An error occurred while getting the answer: {detail}"),
        }
    }

    /// Placeholder answer when no chat provider is configured
    pub fn offline_answer(self, question: &str) -> String {
        match self {
            PromptLanguage::Ru => {
                format!("Это тестовый ответ. Укажите OPENAI_API_KEY. Вопрос: {question}")
            }
            PromptLanguage::Ky => {
                format!("Бул тест жообу. OpenAI API ачкычын коюңуз. Суроо: {question}")
            }
            PromptLanguage::En => {
                format!("This is a test answer. Set OPENAI_API_KEY. Question: {question}")
            }
        }
    }
}

/// Build `(system, user)` prompts for a question.
pub fn build_prompts(q: &Question, allow_general: bool) -> (String, String) {
    let lang = PromptLanguage::from_code(&q.language);
    let system = format!("{}{}", lang.persona(), lang.thin_context_rule(allow_general));
    let (ctx_label, q_label, a_label) = match lang {
        PromptLanguage::Ru => ("Контекст (может быть пустым):", "Вопрос:", "Ответ:"),
        PromptLanguage::Ky => ("Контекст (бош болушу мүмкүн):", "Суроо:", "Жооп:"),
        PromptLanguage::En => ("Context (may be empty):", "Question:", "Answer:"),
    };
    let user = format!(
        "{ctx_label}\n{}\n\n{q_label} {}\n\n{a_label}",
        q.context, q.question
    );
    (system, user)
}
