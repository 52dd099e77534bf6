//! Keyword lexicons used to score raw headline sentiment.

use crate::data_source::Language;

const PT_POSITIVE: &[&str] = &[
    "alta", "sobe", "subiu", "dispara", "disparam", "avança", "avanço", "lucro", "lucros",
    "recorde", "ganho", "ganhos", "valoriza", "valorização", "otimismo", "crescimento", "cresce",
    "compra", "supera", "aprova", "dividendos", "recupera", "recuperação", "forte", "positivo",
];

const PT_NEGATIVE: &[&str] = &[
    "queda", "cai", "caiu", "despenca", "despencam", "recua", "recuo", "prejuízo", "perda",
    "perdas", "desvaloriza", "pessimismo", "crise", "risco", "venda", "rebaixa", "rebaixamento",
    "investigação", "fraude", "multa", "dívida", "fraco", "negativo", "corte", "demissões",
];

const EN_POSITIVE: &[&str] = &[
    "surge", "surges", "soar", "soars", "rally", "rallies", "gain", "gains", "jump", "jumps",
    "beat", "beats", "record", "profit", "growth", "upgrade", "upgraded", "bullish", "strong",
    "rise", "rises", "outperform", "buy", "dividend", "rebound",
];

const EN_NEGATIVE: &[&str] = &[
    "fall", "falls", "drop", "drops", "plunge", "plunges", "slump", "loss", "losses", "miss",
    "misses", "downgrade", "downgraded", "bearish", "weak", "decline", "declines", "lawsuit",
    "probe", "fraud", "fine", "debt", "sell", "cut", "layoffs",
];

/// Raw sentiment of `text` in [-1, 1]: `(pos - neg) / (pos + neg)`, 0 without keyword hits.
pub fn score(text: &str, language: Language) -> f64 {
    let (positive, negative) = match language {
        Language::Pt => (PT_POSITIVE, PT_NEGATIVE),
        Language::En => (EN_POSITIVE, EN_NEGATIVE),
    };

    let lowered = text.to_lowercase();
    let (mut pos, mut neg) = (0_u32, 0_u32);
    for token in lowered
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|token| !token.is_empty())
    {
        if positive.contains(&token) {
            pos += 1;
        } else if negative.contains(&token) {
            neg += 1;
        }
    }

    let hits = pos + neg;
    if hits == 0 {
        return 0.0;
    }
    (f64::from(pos) - f64::from(neg)) / f64::from(hits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_portuguese_headlines() {
        assert_eq!(score("Petrobras dispara após lucro recorde", Language::Pt), 1.0);
        assert_eq!(score("Ibovespa cai com crise fiscal", Language::Pt), -1.0);
        assert_eq!(score("Vale tem alta apesar de queda do minério", Language::Pt), 0.0);
    }

    #[test]
    fn scores_english_headlines_case_insensitively() {
        assert_eq!(score("NVIDIA Soars On Record Profit", Language::En), 1.0);
        let mixed = score("Apple beats estimates but shares drop, analysts cut targets", Language::En);
        assert!((mixed - (-1.0 / 3.0)).abs() < 1e-12);
    }

    #[test]
    fn no_keywords_is_neutral() {
        assert_eq!(score("Assembleia geral ordinária convocada", Language::Pt), 0.0);
        assert_eq!(score("", Language::En), 0.0);
    }
}
