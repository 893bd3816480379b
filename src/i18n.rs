use std::collections::HashMap;

pub struct I18n {
    translations: HashMap<String, HashMap<String, String>>,
    current_lang: String,
}

const EN: &[(&str, &str)] = &[
    // Runtime messages
    ("enter_command", "Enter your command: "),
    ("processing", "Processing command:"),
    ("working_directory", "Working Directory"),
    ("interpreted", "Interpreted commands:"),
    ("command_result", "Command Result"),
    ("step", "Step {0}/{1}"),
    ("skipped", "{0} remaining command(s) skipped"),
    ("execution_succeeded", "Command executed successfully!"),
    ("execution_failed", "Command execution failed!"),
    ("error_label", "Error:"),
    // History
    ("history_title", "Command History:"),
    ("no_history", "No command history found"),
    ("history_command", "Command:"),
    ("history_status", "Status:"),
    ("history_timestamp", "Timestamp:"),
    ("history_output", "Output:"),
    ("history_error", "Error:"),
    // Errors
    ("error_empty_request", "No command given"),
    ("error_build_policy", "Failed to set up command policy"),
    ("error_llm_client", "Failed to set up the language model client"),
    ("error_read_stdin", "Failed to read command from stdin"),
];

const ZH: &[(&str, &str)] = &[
    ("enter_command", "请输入命令: "),
    ("processing", "正在处理命令:"),
    ("working_directory", "工作目录"),
    ("interpreted", "解析出的命令:"),
    ("command_result", "命令结果"),
    ("step", "第 {0}/{1} 步"),
    ("skipped", "已跳过剩余 {0} 条命令"),
    ("execution_succeeded", "命令执行成功!"),
    ("execution_failed", "命令执行失败!"),
    ("error_label", "错误:"),
    ("history_title", "命令历史:"),
    ("no_history", "没有找到命令历史"),
    ("history_command", "命令:"),
    ("history_status", "状态:"),
    ("history_timestamp", "时间:"),
    ("history_output", "输出:"),
    ("history_error", "错误:"),
    ("error_empty_request", "没有输入命令"),
    ("error_build_policy", "初始化命令策略失败"),
    ("error_llm_client", "初始化语言模型客户端失败"),
    ("error_read_stdin", "读取标准输入失败"),
];

fn table(entries: &[(&str, &str)]) -> HashMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl I18n {
    pub fn new(lang: &str) -> Self {
        let mut translations = HashMap::new();
        translations.insert("en".to_string(), table(EN));
        translations.insert("zh".to_string(), table(ZH));

        let effective_lang = if lang.starts_with("zh") || lang == "cn" || lang == "chinese" {
            "zh"
        } else {
            "en"
        };

        Self {
            translations,
            current_lang: effective_lang.to_string(),
        }
    }

    pub fn t(&self, key: &str) -> String {
        if let Some(lang_map) = self.translations.get(&self.current_lang) {
            if let Some(value) = lang_map.get(key) {
                return value.clone();
            }
        }
        key.to_string()
    }

    pub fn t_format(&self, key: &str, args: &[&str]) -> String {
        let template = self.t(key);
        let mut result = template;
        for (i, arg) in args.iter().enumerate() {
            result = result.replace(&format!("{{{}}}", i), arg);
        }
        result
    }
}
