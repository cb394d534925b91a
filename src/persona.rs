//! Persona configuration.
//!
//! Every persona is the same chat client parameterized by id, display
//! strings and webhook endpoint. The built-in set mirrors the production
//! dashboard; custom personas can be constructed directly for other
//! deployments or for tests.

use serde::{Deserialize, Serialize};

/// Configuration of one selectable chat persona.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    /// Stable identifier, also the prefix of the storage keys.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Two-letter avatar initials.
    pub initials: String,
    /// Webhook endpoint answering `sendMessage` requests.
    pub endpoint: String,
    /// Assistant message opening every new conversation.
    pub greeting: String,
}

impl Persona {
    /// Build a persona from its parts.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        initials: impl Into<String>,
        endpoint: impl Into<String>,
        greeting: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            initials: initials.into(),
            endpoint: endpoint.into(),
            greeting: greeting.into(),
        }
    }

    /// Source tag sent in the request metadata.
    #[must_use]
    pub fn source(&self) -> String {
        format!("{}-chat", self.id)
    }

    /// Storage key for the serialized conversation map.
    #[must_use]
    pub fn chats_key(&self) -> String {
        format!("{}-chats", self.id)
    }

    /// Storage key for the opaque backend session id.
    #[must_use]
    pub fn session_id_key(&self) -> String {
        format!("{}-session-id", self.id)
    }

    /// Storage key for the sidebar visibility flag.
    #[must_use]
    pub fn sidebar_key(&self) -> String {
        format!("{}-sidebar-visible", self.id)
    }

    /// The built-in personas, as deployed on the dashboard.
    #[must_use]
    pub fn builtin() -> Vec<Persona> {
        let webhook = |hook: &str| {
            format!("https://n8n-c2lq.onrender.com/webhook/{hook}/chat?action=sendMessage")
        };
        vec![
            Persona::new(
                "alex-ai",
                "Alex AI",
                "AA",
                webhook("65c03f65-d13c-43c7-967d-708dcceef965"),
                "Ciao! Sono Alex AI, il tuo Cross-Platform Ads Strategist. Come posso aiutarti oggi?",
            ),
            Persona::new(
                "daniele-ai",
                "Daniele AI",
                "DA",
                webhook("b53858eb-1e73-4798-80ae-13c0d3323f1a"),
                "Ciao! Sono Daniele AI, il tuo direct response copywriter di livello mondiale con oltre 30 anni di esperienza nel settore. Come posso supportarti oggi?",
            ),
            Persona::new(
                "jim-ai",
                "Jim AI",
                "JA",
                webhook("bdc4cf07-48f7-4144-ac75-659ab5197b2b"),
                "Ciao! Sono Jim AI, il tuo Sales Coach per moltiplicare le vendite con allenamenti mirati e pratici. Come posso supportarti oggi?",
            ),
            Persona::new(
                "lara-ai",
                "Lara AI",
                "LA",
                webhook("59483f3b-8c59-4381-b94b-9c80a69b8196"),
                "Ciao, sono Lara AI, un Social Media Manager virtuale, perfetta per gestire e automatizzare la creazione dei tuoi contenuti sui social media. Come posso supportarti oggi?",
            ),
            Persona::new(
                "mike-ai",
                "Mike AI",
                "MA",
                webhook("66f3ee04-7d9b-4ae4-9e13-0af7a4cdde77"),
                "Ciao! Sono Mike AI, il tuo esperto di marketing digitale. Come posso aiutarti a migliorare la tua strategia di marketing digitale oggi?",
            ),
            Persona::new(
                "simone-ai",
                "Simone AI",
                "SI",
                webhook("da2742bb-3308-4d18-a58b-77abed489389"),
                "Ciao, sono Simone AI. Il tuo AI SEO Copywriter. Come posso aiutarti oggi?",
            ),
            Persona::new(
                "tony-ai",
                "Tony AI",
                "TA",
                webhook("0c898053-01f4-494d-b013-165c8a9023d1"),
                "Ciao! Sono Tony AI, il tuo consulente vendite digitale. Come posso aiutarti a migliorare le tue vendite oggi?",
            ),
            Persona::new(
                "valentina-ai",
                "Valentina AI",
                "VA",
                webhook("f5636e0e-1355-439b-b5fd-df0174e3dddb"),
                "Ciao, sono Valentina AI. la tua esperta di SEO, specializzata nell'ottimizzazione dei contenuti già pubblicati e nel posizionamento sui motori di ricerca. Come posso aiutarti oggi?",
            ),
        ]
    }

    /// Look up a built-in persona by id.
    #[must_use]
    pub fn find(id: &str) -> Option<Persona> {
        Self::builtin().into_iter().find(|p| p.id == id)
    }
}
