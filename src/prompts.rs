//! Prompt text for document-to-ledger analysis.
//!
//! The system prompt comes from a reference file; only the user-turn
//! instruction is fixed here. It embeds the chart of accounts and the
//! output-format example inline and adds the accounting policy rules the
//! model must follow (account specificity, VAT and reverse-VAT split,
//! export/import revenue and expense accounts, no invented accounts). The
//! rules are instructions to the model; nothing in this crate enforces them.

/// Build the text part of the user message.
///
/// `chart_of_accounts` and `output_format` are inserted verbatim; the
/// output format sits inside a ```` ```json ```` fence.
pub fn user_prompt(chart_of_accounts: &str, output_format: &str) -> String {
    format!(
        r#"Проанализируй следующий первичный документ и преобразуй его в проводки по главной книге. Отдай только JSON.

**План счетов:**
{chart_of_accounts}

**Рекомендации по учету:**

* **Использование аналитических счетов:** Всегда стремись использовать наиболее специфичные и подходящие счета из предоставленного плана счетов, а не только универсальные. Например, для операций с ЕС используй `5330` вместо общего `5310`, если он доступен.
* **Учет НДС по входящим счетам:** Для входящих счетов с НДС, если это требуется по методике (т.е., если НДС не включается в стоимость актива/расхода, а подлежит возмещению/зачету), **разбивай сумму на сумму без НДС и сумму НДС**. Сумму без НДС относи на соответствующий расходный или активный счет, а сумму НДС — на счет `57221` (PVN kreditori - pamatlikme). Если документ содержит обратный НДС, проводки должны отражать налоговую базу на соответствующих счетах расходов/активов и обязательство по НДС на счетах НДС, согласно латвийскому законодательству об обратном НДС.
* **Доходы и расходы по экспортным операциям и услугам:**
    * **Для доходов:** Вместо универсального `6110` (Ieņēmumi no pamatdarbības produkcijas un pakalpojumu pārdošanas), используй более специфичные счета, такие как `6221` (Ieņēmumi no preču pārdošanas 3.valstis) для продаж в третьи страны или `6220` (Ar nodokļiem apliekamie pārdošanas ieņēmumi) для облагаемых НДС продаж внутри ЕС/Латвии.
    * **Для расходов, связанных с экспортом/импортом услуг/товаров:** Используй наиболее подходящие счета, такие как `7170` (Samaksa par darbiem un pakalpojumiem), `7110` (Izejvielu un materiālu iepirkšanas un piegādes izdevumi) или другие специфичные счета из разделов 7ххх, избегая универсальных `7770` (Citi vadīšanas un administrācijas izdevumi) или `7710` (Sakaru izdevumi), если есть более точное соответствие.
* **Строгое соответствие:** Не фантазируй и не придумывай счета или проводки, которых нет в плане счетов или которые не соответствуют прямому смыслу документа. Если информация неоднозначна, используй поле 'Confidence_Score' для отражения неуверенности и, при необходимости, 'VAT_Reason' для пояснения ограничений.

**Формат вывода:**
Вывод должен быть строго в формате JSON. Каждый документ должен быть представлен как массив объектов JSON. Каждый объект в массиве должен представлять собой отдельную проводку.

```json
{output_format}
```
**Пример первичного документа для анализа:**
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeds_chart_and_format_inline() {
        let p = user_prompt("6110 Ieņēmumi\n57221 PVN", r#"[{"Account": "6110"}]"#);
        assert!(p.contains("**План счетов:**\n6110 Ieņēmumi\n57221 PVN\n"));
        assert!(p.contains("```json\n[{\"Account\": \"6110\"}]\n```"));
    }

    #[test]
    fn carries_policy_rules() {
        let p = user_prompt("", "");
        assert!(p.contains("`57221`"), "VAT account rule missing");
        assert!(p.contains("обратный НДС"), "reverse VAT rule missing");
        assert!(p.contains("`6221`"), "export revenue rule missing");
        assert!(p.contains("Не фантазируй"), "anti-hallucination rule missing");
        assert!(p.ends_with("**Пример первичного документа для анализа:**\n"));
    }

    #[test]
    fn deterministic() {
        assert_eq!(user_prompt("a", "b"), user_prompt("a", "b"));
    }
}
