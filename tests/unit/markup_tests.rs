/*!
 * Tests for LaTeX markup classification
 */

use texlate::markup::{MarkupClassifier, MarkupPatterns, SpanKind};

const PAPER: &str = r"\documentclass{article}
\usepackage[utf8]{inputenc}
\begin{document}
\section{Introducción}
Este trabajo estudia la ecuación \(x^2 + y^2 = r^2\) y su relación con \cite{euclid, hilbert}.
% nota: revisar
\begin{equation}
  E = mc^2 \label{eq:energy}
\end{equation}
Como muestra la Ecuación~\eqref{eq:energy}, el costo es de 50\% menos.
\begin{itemize}
  \item \textbf{Primero}: una lista.
\end{itemize}
\end{document}
";

fn protected(text: &str, patterns: &MarkupPatterns) -> Vec<String> {
    MarkupClassifier::new(patterns)
        .classify(text)
        .document
        .protected_spans()
        .map(|s| s.text.clone())
        .collect()
}

/// Test that a realistic paper survives classification byte for byte
#[test]
fn test_classify_withRealisticPaper_shouldReconstructAndProtectMarkup() {
    let classification = MarkupClassifier::default().classify(PAPER);
    assert!(classification.warnings.is_empty());
    assert_eq!(classification.document.reconstruct(), PAPER);

    let protected: Vec<&str> = classification
        .document
        .protected_spans()
        .map(|s| s.text.as_str())
        .collect();
    assert!(protected.contains(&r"\documentclass{article}"));
    assert!(protected.contains(&r"\usepackage[utf8]{inputenc}"));
    assert!(protected.contains(&r"\(x^2 + y^2 = r^2\)"));
    assert!(protected.contains(&r"\cite{euclid, hilbert}"));
    assert!(protected.contains(&"% nota: revisar"));
    assert!(protected.contains(&r"\eqref{eq:energy}"));
    assert!(protected.contains(&r"\%"));
    assert!(protected.iter().any(|p| p.starts_with(r"\begin{equation}") && p.ends_with(r"\end{equation}")));

    let translatable: String = classification
        .document
        .spans()
        .iter()
        .filter(|s| s.kind == SpanKind::Translatable)
        .map(|s| s.text.as_str())
        .collect();
    assert!(translatable.contains("Introducción"));
    assert!(translatable.contains("Primero"));
    assert!(!translatable.contains("mc^2"));
}

/// Test that no two adjacent spans share a kind
#[test]
fn test_classify_withMixedContent_shouldMergeAdjacentSpansOfSameKind() {
    let document = MarkupClassifier::default().classify(PAPER).document;
    for pair in document.spans().windows(2) {
        assert_ne!(pair[0].kind, pair[1].kind, "adjacent spans {:?} and {:?}", pair[0].text, pair[1].text);
    }
}

/// Test that comments can be opened up for translation
#[test]
fn test_classify_withCommentsUnprotected_shouldTranslateComments() {
    let patterns = MarkupPatterns {
        protect_comments: false,
        ..MarkupPatterns::default()
    };
    assert!(protected("texto % una nota\nmás", &patterns).is_empty());
}

/// Test that configured environments are protected whole
#[test]
fn test_classify_withCustomEnvironment_shouldProtectBody() {
    let text = r"Antes \begin{theorem}Todo número par\end{theorem} después";

    let defaults = protected(text, &MarkupPatterns::default());
    assert_eq!(defaults, vec![r"\begin{theorem}", r"\end{theorem}"]);

    let mut patterns = MarkupPatterns::default();
    patterns.protected_environments.push("theorem".to_string());
    assert_eq!(protected(text, &patterns), vec![r"\begin{theorem}Todo número par\end{theorem}"]);
}

/// Test that commands outside the argument list keep their arguments translatable
#[test]
fn test_classify_withFormattingCommand_shouldKeepArgumentTranslatable() {
    let text = r"Un \emph{gran} avance";
    assert_eq!(protected(text, &MarkupPatterns::default()), vec![r"\emph{", "}"]);
}
