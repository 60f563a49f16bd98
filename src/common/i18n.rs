// src/common/i18n.rs

use std::collections::HashMap;

use anyhow::Context;

const DEFAULT_LANG: &str = "en";

// Os arquivos de tradução vão embutidos no binário
const BUNDLES: &[(&str, &str)] = &[
    ("en", include_str!("../../locales/en.json")),
    ("pt", include_str!("../../locales/pt.json")),
];

/// Catálogo de mensagens por idioma: lang -> (chave -> mensagem).
#[derive(Debug, Clone, Default)]
pub struct I18nStore {
    messages: HashMap<String, HashMap<String, String>>,
}

impl I18nStore {
    pub fn load() -> anyhow::Result<Self> {
        let mut messages = HashMap::new();

        for (lang, raw) in BUNDLES {
            let bundle: HashMap<String, String> = serde_json::from_str(raw)
                .with_context(|| format!("Arquivo de tradução inválido: {}", lang))?;
            messages.insert(lang.to_string(), bundle);
        }

        Ok(Self { messages })
    }

    /// Traduz `key` para `lang`, caindo para inglês e, por fim, para a própria chave.
    /// Placeholders no formato `{nome}` são substituídos por `args`.
    pub fn translate(&self, lang: &str, key: &str, args: &[(&str, String)]) -> String {
        let template = self
            .lookup(lang, key)
            .or_else(|| self.lookup(DEFAULT_LANG, key))
            .unwrap_or(key);

        args.iter().fold(template.to_string(), |acc, (name, value)| {
            acc.replace(&format!("{{{}}}", name), value)
        })
    }

    fn lookup(&self, lang: &str, key: &str) -> Option<&str> {
        self.messages
            .get(lang)
            .and_then(|bundle| bundle.get(key))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_with_placeholders() {
        let store = I18nStore::load().unwrap();
        let msg = store.translate(
            "en",
            "plan_limit_reached",
            &[("limit", "3".into()), ("resource", "agents".into())],
        );
        assert_eq!(msg, "Plan limit reached. Your current plan allows up to 3 agents.");
    }

    #[test]
    fn falls_back_to_english_then_to_key() {
        let store = I18nStore::load().unwrap();
        assert_eq!(store.translate("de", "user_not_found", &[]), "User not found.");
        assert_eq!(store.translate("pt", "no.such.key", &[]), "no.such.key");
    }

    #[test]
    fn every_bundle_has_the_same_keys() {
        let store = I18nStore::load().unwrap();
        let en = &store.messages["en"];
        let pt = &store.messages["pt"];
        let mut missing: Vec<&String> = en.keys().filter(|k| !pt.contains_key(*k)).collect();
        missing.sort();
        assert!(missing.is_empty(), "chaves faltando em pt: {:?}", missing);
    }
}
