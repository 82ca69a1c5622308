//! Curated reference knowledge seeded into an empty corpus.

use crate::model::KnowledgeCategory::{self, *};

pub(super) struct SeedItem {
    pub id: &'static str,
    pub category: KnowledgeCategory,
    pub kind: &'static str,
    pub text: &'static str,
}

pub(super) const SEED_KNOWLEDGE: &[SeedItem] = &[
    SeedItem {
        id: "fallacy-ad-hominem",
        category: Fallacy,
        kind: "ad_hominem",
        text: "Ad hominem: attacking the person making an argument (calling them stupid, \
               ignorant, biased or a liar) instead of addressing the argument itself.",
    },
    SeedItem {
        id: "fallacy-straw-man",
        category: Fallacy,
        kind: "straw_man",
        text: "Straw man: misrepresenting or exaggerating an opponent's position so that it \
               is easier to attack than the argument they actually made.",
    },
    SeedItem {
        id: "fallacy-false-dichotomy",
        category: Fallacy,
        kind: "false_dichotomy",
        text: "False dichotomy: presenting only two options as if they were the only \
               possibilities when other alternatives exist, either we do this or disaster.",
    },
    SeedItem {
        id: "fallacy-slippery-slope",
        category: Fallacy,
        kind: "slippery_slope",
        text: "Slippery slope: claiming one step will inevitably lead to a chain of extreme \
               consequences without showing why each step would follow.",
    },
    SeedItem {
        id: "fallacy-appeal-to-emotion",
        category: Fallacy,
        kind: "appeal_to_emotion",
        text: "Appeal to emotion: using fear, pity, outrage or other feelings in place of \
               evidence and reasoning to win agreement.",
    },
    SeedItem {
        id: "fallacy-hasty-generalization",
        category: Fallacy,
        kind: "hasty_generalization",
        text: "Hasty generalization: drawing a broad conclusion about all cases from a small \
               or unrepresentative sample, often signalled by words like all, always, never, everyone.",
    },
    SeedItem {
        id: "fallacy-appeal-to-authority",
        category: Fallacy,
        kind: "appeal_to_authority",
        text: "Appeal to authority: treating a claim as true because an authority figure said \
               it, especially when the authority is not an expert in the subject.",
    },
    SeedItem {
        id: "fallacy-circular-reasoning",
        category: Fallacy,
        kind: "circular_reasoning",
        text: "Circular reasoning: the conclusion is assumed in the premises, so the argument \
               proves nothing beyond restating itself.",
    },
    SeedItem {
        id: "fallacy-red-herring",
        category: Fallacy,
        kind: "red_herring",
        text: "Red herring: introducing an irrelevant topic to divert attention from the \
               original issue under debate.",
    },
    SeedItem {
        id: "fallacy-bandwagon",
        category: Fallacy,
        kind: "bandwagon",
        text: "Bandwagon: arguing a claim is true or good because many people believe it or \
               everyone is doing it.",
    },
    SeedItem {
        id: "evidence-peer-reviewed",
        category: Evidence,
        kind: "strong_evidence",
        text: "Strong evidence: peer-reviewed research, a published study or meta-analysis in \
               a reputable journal, with data and methodology that others can check.",
    },
    SeedItem {
        id: "evidence-statistics",
        category: Evidence,
        kind: "strong_evidence",
        text: "Strong evidence: official statistics and survey data from credible sources, \
               cited with the source and the year according to which the numbers were reported.",
    },
    SeedItem {
        id: "evidence-expert-consensus",
        category: Evidence,
        kind: "strong_evidence",
        text: "Strong evidence: broad expert consensus documented by scientific bodies or \
               systematic reviews, rather than a single expert opinion.",
    },
    SeedItem {
        id: "evidence-anecdotal",
        category: Evidence,
        kind: "weak_evidence",
        text: "Weak evidence: personal anecdotes, a single example, hearsay or unnamed sources; \
               useful for illustration but not for proving a general claim.",
    },
    SeedItem {
        id: "technique-direct-rebuttal",
        category: Technique,
        kind: "rebuttal",
        text: "Direct rebuttal: quote or paraphrase the opponent's claim, then show why its \
               premise is false, its evidence weak or its conclusion does not follow.",
    },
    SeedItem {
        id: "technique-steelman",
        category: Technique,
        kind: "steelman",
        text: "Steelmanning: restate the strongest version of the opponent's argument before \
               responding to it, which builds credibility and avoids straw men.",
    },
    SeedItem {
        id: "technique-concession",
        category: Technique,
        kind: "concession",
        text: "Strategic concession: acknowledge a valid point from the opponent, however \
               small, then explain why your position still holds overall.",
    },
    SeedItem {
        id: "logic-deductive",
        category: Logic,
        kind: "deductive_reasoning",
        text: "Deductive reasoning: if the premises are true and the structure is valid, the \
               conclusion must be true; check each premise separately.",
    },
    SeedItem {
        id: "logic-causation",
        category: Logic,
        kind: "correlation_causation",
        text: "Correlation is not causation: two things occurring together does not show that \
               one causes the other; look for confounders and mechanisms.",
    },
    SeedItem {
        id: "rhetoric-ethos-pathos-logos",
        category: Rhetoric,
        kind: "persuasive_appeals",
        text: "Rhetorical appeals: ethos builds credibility, pathos engages emotion and logos \
               relies on logic and evidence; strong arguments lead with logos.",
    },
    SeedItem {
        id: "concept-burden-of-proof",
        category: Concept,
        kind: "burden_of_proof",
        text: "Burden of proof: the side making a claim is responsible for supporting it with \
               evidence; it is not the opponent's job to disprove an unsupported claim.",
    },
];
